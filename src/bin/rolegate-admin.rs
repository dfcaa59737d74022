use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rolegate::{
    config::{generate_secret_key, render_env_file, AppConfig},
    db, logging,
    users::{PgUserRepo, RoleUpdate, UserRepo},
};

/// Administrative tasks for a rolegate site.
#[derive(Debug, Parser)]
#[command(name = "rolegate-admin", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a `.env` file with a fresh secret key.
    Setup {
        /// Base URL of the site, e.g. https://www.mysite.com
        base_url: String,
        /// Name of the database to use.
        dbname: String,
        #[arg(long, default_value = ".env")]
        output: PathBuf,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Inspect or edit a user's roles directly in the database.
    Roles {
        #[command(subcommand)]
        action: RoleAction,
    },
}

#[derive(Debug, Subcommand)]
enum RoleAction {
    Show { username: String },
    Add { username: String, role: String },
    Remove { username: String, role: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Setup {
            base_url,
            dbname,
            output,
            force,
        } => setup(&base_url, &dbname, &output, force),
        Command::Roles { action } => {
            dotenvy::dotenv().ok();
            logging::init("rolegate=info,sqlx=warn");
            roles(action).await
        }
    }
}

fn setup(base_url: &str, dbname: &str, output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        bail!("{} already exists; pass --force to overwrite it", output.display());
    }
    let contents = render_env_file(&generate_secret_key(), base_url, dbname);
    std::fs::write(output, &contents)
        .with_context(|| format!("write {}", output.display()))?;
    println!("Wrote {}:\n\n{contents}", output.display());
    Ok(())
}

async fn roles(action: RoleAction) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let pool = db::connect(&config).await?;
    db::migrate(&pool).await?;
    let repo = PgUserRepo::new(pool);

    let (username, update) = match action {
        RoleAction::Show { username } => {
            let user = repo
                .find_by_username(&username)
                .await?
                .with_context(|| format!("no user named {username}"))?;
            println!("Current roles: {:?}", user.roles);
            return Ok(());
        }
        RoleAction::Add { username, role } => {
            let update = repo.add_role(&username, &role).await?;
            (username, update)
        }
        RoleAction::Remove { username, role } => {
            let update = repo.remove_role(&username, &role).await?;
            (username, update)
        }
    };

    match update {
        RoleUpdate::Updated(roles) => println!("Updated roles: {roles:?}"),
        RoleUpdate::Unchanged => println!("No change for {username}"),
        RoleUpdate::NoSuchUser => bail!("no user named {username}"),
    }
    Ok(())
}
