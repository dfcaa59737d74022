use std::net::SocketAddr;

use axum::{
    http::{header, HeaderValue},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::state::AppState;
use crate::{auth, error, pages, roles};

const NO_CACHE: &str = "public, max-age=0, must-revalidate, no-cache";

pub fn build_app(state: AppState) -> Router {
    with_layers(
        Router::new()
            .merge(pages::router())
            .merge(auth::router())
            .merge(roles::router())
            .fallback(error::not_found)
            .with_state(state),
    )
}

/// Panic recovery, cache headers and request tracing shared by every route.
fn with_layers(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(NO_CACHE),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    use crate::users::ADMIN_ROLE;

    struct Reply {
        status: StatusCode,
        location: Option<String>,
        cookie: Option<String>,
        body: String,
    }

    fn read_reply_parts(res: &Response) -> (StatusCode, Option<String>, Option<String>) {
        let value_of = |name: header::HeaderName| {
            res.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        // Only the `name=value` pair is sent back by a browser.
        let cookie = value_of(header::SET_COOKIE)
            .and_then(|c| c.split(';').next().map(str::to_string))
            .filter(|c| !c.ends_with('='));
        (res.status(), value_of(header::LOCATION), cookie)
    }

    async fn send(app: &Router, req: Request<Body>) -> Reply {
        let res = app.clone().oneshot(req).await.unwrap();
        let (status, location, cookie) = read_reply_parts(&res);
        let bytes = axum::body::to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
        Reply {
            status,
            location,
            cookie,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Reply {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        send(app, builder.body(Body::empty()).unwrap()).await
    }

    async fn post(app: &Router, uri: &str, form: &str, cookie: Option<&str>) -> Reply {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        send(app, builder.body(Body::from(form.to_string())).unwrap()).await
    }

    async fn register(app: &Router, username: &str) -> Reply {
        let form = format!(
            "username={username}&firstname=First&lastname=Last&email={username}%40example.com\
             &password=password123&confirm=password123"
        );
        post(app, "/register", &form, None).await
    }

    /// Logs in after visiting `/login`, returning the session cookie.
    async fn login(app: &Router, username: &str, cookie: Option<&str>) -> String {
        let page = get(app, "/login", cookie).await;
        let cookie = page.cookie.expect("login page sets a session cookie");
        let res = post(
            app,
            "/login",
            &format!("username={username}&password=password123"),
            Some(&cookie),
        )
        .await;
        assert_eq!(res.status, StatusCode::SEE_OTHER, "login failed: {}", res.body);
        res.cookie.expect("login sets a session cookie")
    }

    fn app() -> Router {
        build_app(AppState::fake())
    }

    #[tokio::test]
    async fn public_pages_render_with_no_cache_headers() {
        let app = app();
        for uri in ["/", "/pagepublic"] {
            let res = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(res.headers().get(header::CACHE_CONTROL).unwrap(), NO_CACHE);
        }
        let res = get(&app, "/pagepublic", None).await;
        assert!(res.body.contains("Not logged in"));
    }

    #[tokio::test]
    async fn unknown_route_is_json_error() {
        let res = get(&app(), "/missing", None).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_str(&res.body).unwrap();
        assert_eq!(body["message"], "Not Found");
    }

    #[tokio::test]
    async fn handler_panic_is_json_error() {
        async fn explode() -> &'static str {
            panic!("handler blew up")
        }
        let app = with_layers(Router::new().route("/explode", axum::routing::get(explode)));
        let res = app
            .oneshot(Request::get("/explode").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.headers().get(header::CACHE_CONTROL).unwrap(), NO_CACHE);
        let bytes = axum::body::to_bytes(res.into_body(), 64 * 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "handler blew up");
    }

    #[tokio::test]
    async fn health_is_ok() {
        let res = get(&app(), "/health", None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body, "ok");
    }

    #[tokio::test]
    async fn anonymous_visit_redirects_to_login_then_back() {
        let app = app();
        assert_eq!(register(&app, "alice").await.location.as_deref(), Some("/login"));

        let res = get(&app, "/pageauthonly?tab=1", None).await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location.as_deref(), Some("/login"));
        let pending = res.cookie.expect("request path stored in session");

        let page = get(&app, "/login", Some(&pending)).await;
        let cookie = page.cookie.unwrap();
        let res = post(&app, "/login", "username=alice&password=password123", Some(&cookie)).await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location.as_deref(), Some("/pageauthonly"));

        let session = res.cookie.unwrap();
        let res = get(&app, "/pageauthonly", Some(&session)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("First Last"));
    }

    #[tokio::test]
    async fn login_without_prior_request_goes_home() {
        let app = app();
        register(&app, "alice").await;
        let res = post(&app, "/login", "username=alice&password=password123", None).await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location.as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn login_errors_are_attached_to_fields() {
        let app = app();
        register(&app, "alice").await;

        let res = post(&app, "/login", "username=bob&password=password123", None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("User not found."));

        let res = post(&app, "/login", "username=alice&password=wrong-pass", None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("Incorrect password."));
        assert!(!res.body.contains("wrong-pass"));
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let app = app();
        register(&app, "alice").await;
        let res = register(&app, "alice").await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("User already exists"));
    }

    #[tokio::test]
    async fn invalid_registration_rerenders_form() {
        let res = post(
            &app(),
            "/register",
            "username=al&firstname=&lastname=L&email=bad&password=x&confirm=y",
            None,
        )
        .await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("Invalid email address."));
        assert!(res.body.contains("Passwords must match."));
    }

    #[tokio::test]
    async fn malformed_form_body_is_json_error() {
        let req = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let res = send(&app(), req).await;
        assert!(res.status.is_client_error());
        let body: serde_json::Value = serde_json::from_str(&res.body).unwrap();
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn first_user_is_admin_and_second_is_not() {
        let app = app();
        register(&app, "alice").await;
        register(&app, "bob").await;

        let admin = login(&app, "alice", None).await;
        let res = get(&app, "/pageadminonly", Some(&admin)).await;
        assert_eq!(res.status, StatusCode::OK);

        let bob = login(&app, "bob", None).await;
        let res = get(&app, "/pageadminonly", Some(&bob)).await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location.as_deref(), Some("/nopermission"));

        let denied = res.cookie.unwrap();
        let res = get(&app, "/nopermission", Some(&denied)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("https://site.test/pageadminonly"));
    }

    #[tokio::test]
    async fn anonymous_roles_request_redirects_to_login() {
        let res = get(&app(), "/roles", None).await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location.as_deref(), Some("/login"));
    }

    #[tokio::test]
    async fn admin_adds_and_removes_roles() {
        let app = app();
        register(&app, "alice").await;
        register(&app, "bob").await;
        let admin = login(&app, "alice", None).await;

        let res = get(&app, "/roles", Some(&admin)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains(&format!("<td>alice</td><td>{ADMIN_ROLE}</td>")));

        let res = post(&app, "/roles", "username=bob&addrole=admin", Some(&admin)).await;
        assert!(res.body.contains("Added: admin for: bob"));
        assert!(res.body.contains("<td>bob</td><td>admin</td>"));

        // Roles are read at login, so bob needs a fresh session.
        let bob = login(&app, "bob", None).await;
        assert_eq!(get(&app, "/pageadminonly", Some(&bob)).await.status, StatusCode::OK);

        let res = post(&app, "/roles", "username=bob&addrole=admin", Some(&admin)).await;
        assert!(res.body.contains("User already has this role."));
        assert!(!res.body.contains("Added: admin for: bob"));
        assert!(res.body.contains("<td>bob</td><td>admin</td>"));

        let res = post(&app, "/roles", "username=bob&remrole=admin", Some(&admin)).await;
        assert!(res.body.contains("Removed: admin for: bob"));
        assert!(res.body.contains("<td>bob</td><td></td>"));

        let res = post(&app, "/roles", "username=bob&remrole=admin", Some(&admin)).await;
        assert!(res.body.contains("Role does not exist for this user."));

        let res = post(&app, "/roles", "username=ghost&addrole=x", Some(&admin)).await;
        assert!(res.body.contains("User does not exist."));
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let app = app();
        register(&app, "alice").await;
        let session = login(&app, "alice", None).await;

        let res = get(&app, "/logout", Some(&session)).await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location.as_deref(), Some("/"));
        assert!(res.cookie.is_none());

        // A browser drops the expired cookie, so the next visit is anonymous.
        let res = get(&app, "/pageauthonly", None).await;
        assert_eq!(res.location.as_deref(), Some("/login"));
    }
}
