mod memory;
mod repo;
mod repo_types;

pub use memory::MemoryUserRepo;
pub use repo::{PgUserRepo, UserRepo};
pub use repo_types::{NewUser, RoleUpdate, User, ADMIN_ROLE};
