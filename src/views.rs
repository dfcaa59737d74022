//! Server-rendered HTML pages.

use std::fmt::Write;

use crate::{
    forms::{FormErrors, LoginForm, RegistrationForm, RoleForm},
    session::SessionUser,
    users::User,
};

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn footer(user: Option<&SessionUser>) -> String {
    let name = match user {
        Some(u) => format!("{} {}", escape(&u.firstname), escape(&u.lastname)),
        None => "Not logged in".to_string(),
    };
    format!(r#"<footer><p>{name}</p></footer>"#)
}

fn layout(title: &str, user: Option<&SessionUser>, body: &str) -> String {
    let account = if user.is_some() {
        r#"<a href="/logout">Log out</a>"#
    } else {
        r#"<a href="/login">Log in</a> | <a href="/register">Register</a>"#
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
<nav><a href="/">Home</a> | <a href="/pagepublic">Public</a> | <a href="/pageauthonly">Members</a> | <a href="/pageadminonly">Admin</a> | <a href="/roles">Roles</a> | {account}</nav>
<main>
<h1>{title}</h1>
{body}
</main>
{footer}
</body>
</html>
"#,
        title = escape(title),
        footer = footer(user),
    )
}

fn field(
    out: &mut String,
    name: &str,
    label: &str,
    kind: &str,
    value: &str,
    errors: &FormErrors,
) {
    let _ = write!(
        out,
        r#"<p><label for="{name}">{label}</label> <input type="{kind}" id="{name}" name="{name}" value="{value}">"#,
        value = escape(value),
    );
    for message in errors.field(name) {
        let _ = write!(out, r#" <span class="error">{}</span>"#, escape(message));
    }
    out.push_str("</p>\n");
}

fn static_page(title: &str, text: &str, user: Option<&SessionUser>) -> String {
    layout(title, user, &format!("<p>{text}</p>"))
}

pub fn home(user: Option<&SessionUser>) -> String {
    static_page("Home", "Welcome. Register or log in to see more.", user)
}

pub fn page_public(user: Option<&SessionUser>) -> String {
    static_page("Public page", "Anyone can see this page.", user)
}

pub fn page_auth_only(user: Option<&SessionUser>) -> String {
    static_page("Members page", "Only logged-in users can see this page.", user)
}

pub fn page_admin_only(user: Option<&SessionUser>) -> String {
    static_page("Admin page", "Only administrators can see this page.", user)
}

pub fn no_permission(user: Option<&SessionUser>, requested: &str) -> String {
    let body = format!(
        r#"<p>You do not have permission to view <a href="{url}">{url}</a>.</p>"#,
        url = escape(requested),
    );
    layout("No permission", user, &body)
}

pub fn login(form: &LoginForm, errors: &FormErrors, user: Option<&SessionUser>) -> String {
    let mut body = String::from(r#"<form method="post" action="/login">"#);
    body.push('\n');
    field(&mut body, "username", "Username", "text", &form.username, errors);
    field(&mut body, "password", "Password", "password", "", errors);
    body.push_str(r#"<p><button type="submit">Log in</button></p></form>"#);
    layout("Log in", user, &body)
}

pub fn register(
    form: &RegistrationForm,
    errors: &FormErrors,
    user: Option<&SessionUser>,
) -> String {
    let mut body = String::from(r#"<form method="post" action="/register">"#);
    body.push('\n');
    field(&mut body, "username", "Username", "text", &form.username, errors);
    field(&mut body, "firstname", "First name", "text", &form.firstname, errors);
    field(&mut body, "lastname", "Last name", "text", &form.lastname, errors);
    field(&mut body, "email", "Email", "email", &form.email, errors);
    field(&mut body, "password", "Password", "password", "", errors);
    field(&mut body, "confirm", "Repeat password", "password", "", errors);
    body.push_str(r#"<p><button type="submit">Register</button></p></form>"#);
    layout("Register", user, &body)
}

pub fn roles(
    form: &RoleForm,
    errors: &FormErrors,
    messages: &[String],
    users: &[User],
    user: Option<&SessionUser>,
) -> String {
    let mut body = String::new();
    for message in messages {
        let _ = writeln!(body, r#"<p class="flash">{}</p>"#, escape(message));
    }

    body.push_str(r#"<form method="post" action="/roles">"#);
    body.push('\n');
    field(&mut body, "username", "Username", "text", &form.username, errors);
    field(&mut body, "addrole", "Add role", "text", &form.addrole, errors);
    field(&mut body, "remrole", "Remove role", "text", &form.remrole, errors);
    body.push_str("<p><button type=\"submit\">Update</button></p></form>\n");

    body.push_str("<table>\n<tr><th>User</th><th>Roles</th></tr>\n");
    for u in users {
        let _ = writeln!(
            body,
            "<tr><td>{}</td><td>{}</td></tr>",
            escape(&u.username),
            escape(&u.roles.join(", ")),
        );
    }
    body.push_str("</table>");

    layout("Roles", user, &body)
}
