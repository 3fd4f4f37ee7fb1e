use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;

use crate::controller::{
    health_check_controller, message_controller, page_controller, session_controller,
    user_controller,
};
use crate::middleware::{request_id, request_logger, session_required};
use service::AppState;

/// Builds the axum router exposing the whole http surface of the
/// application.
pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(page_routes(app_state.clone()))
        .merge(session_routes(app_state.clone()))
        .merge(stream_routes(app_state.clone()))
        .merge(message_routes(app_state.clone()))
        .merge(user_routes(app_state))
        .merge(health_routes())
        .fallback_service(static_routes())
        .layer(from_fn(request_logger))
        .layer(from_fn(request_id))
}

fn page_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(page_controller::index))
        .merge(
            Router::new()
                .route("/chat", get(page_controller::chat))
                .route_layer(from_fn_with_state(app_state.clone(), session_required)),
        )
        .with_state(app_state)
}

fn session_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/login", post(session_controller::login))
        .route("/logout", post(session_controller::logout))
        .with_state(app_state)
}

fn stream_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/stream", get(crate::sse::stream_handler))
        .route_layer(from_fn_with_state(app_state.clone(), session_required))
        .with_state(app_state)
}

fn message_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/message", post(message_controller::send_message))
        .route_layer(from_fn_with_state(app_state.clone(), session_required))
        .with_state(app_state)
}

fn user_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/users", get(user_controller::index))
        .route_layer(from_fn_with_state(app_state.clone(), session_required))
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

// Serves the embedded frontend assets for every path no other route
// claims.
fn static_routes() -> Router {
    Router::new().nest_service("/", ServeDir::new("web/static"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use clap::Parser;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    use domain::{
        EventAnnouncer, FanoutNotifier, LastMessagesBuffer, MessageNotifier,
        MessageNotifierWithBuffer, SessionCookieStore, SessionStateFactory, SessionTokenizerFactory,
        StateOnlineUsers, StreamSubscribeRequest,
    };
    use events::{
        Bridge, BridgeEventProducer, BridgeEventRouter, BridgeEventType, Clock, IdGenerator,
        SystemClock, UuidGenerator,
    };
    use service::Config;
    use sse::MessageFanout;

    fn test_app_state() -> AppState {
        // Tests that only exercise the http surface publish into a
        // bridge with no handler.
        app_state_with_bridge(Arc::new(Bridge::new(None)), Arc::new(MessageFanout::new()))
    }

    fn app_state_with_bridge(bridge: Arc<Bridge>, fanout: Arc<MessageFanout>) -> AppState {
        let config = Config::parse_from(["szmaterlok"]);

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let id_generator: Arc<dyn IdGenerator> = Arc::new(UuidGenerator);
        let buffer = Arc::new(LastMessagesBuffer::new(config.last_messages_buffer_size));

        let notifier: Arc<dyn MessageNotifier> = Arc::new(EventAnnouncer {
            notifier: Arc::new(MessageNotifierWithBuffer {
                notifier: Arc::new(FanoutNotifier::new(fanout)),
                buffer,
            }),
            user_join_producer: Arc::new(BridgeEventProducer::new(
                bridge.clone(),
                BridgeEventType::UserJoin,
                clock.clone(),
            )),
            user_left_producer: Arc::new(BridgeEventProducer::new(
                bridge.clone(),
                BridgeEventType::UserLeft,
                clock.clone(),
            )),
            clock: clock.clone(),
            id_generator: id_generator.clone(),
        });

        let tokenizer = SessionTokenizerFactory {
            timeout: std::time::Duration::from_secs(60),
            clock: clock.clone(),
        }
        .tokenizer(&config.tokenizer, &config.session_secret)
        .unwrap();

        AppState {
            config,
            notifier,
            message_producer: Arc::new(BridgeEventProducer::new(
                bridge,
                BridgeEventType::MessageSent,
                clock.clone(),
            )),
            online_users: Arc::new(StateOnlineUsers::new()),
            session_store: Arc::new(SessionCookieStore::new(tokenizer, clock.clone())),
            state_factory: Arc::new(SessionStateFactory::new(id_generator.clone(), clock.clone())),
            id_generator,
            clock,
        }
    }

    async fn login(app: &Router, nickname: &str) -> String {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header(
                        header::CONTENT_TYPE,
                        "application/x-www-form-urlencoded",
                    )
                    .body(Body::from(format!("nickname={nickname}")))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/chat");

        let cookie = response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .to_owned();
        assert!(cookie.starts_with("SzmaterlokSession="));

        cookie.split(';').next().unwrap().to_owned()
    }

    #[tokio::test]
    async fn protected_routes_reject_requests_without_session() {
        let app = define_routes(test_app_state());

        for uri in ["/users", "/chat", "/stream"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "uri: {uri}");
        }
    }

    #[tokio::test]
    async fn login_issues_session_cookie_and_unlocks_protected_routes() {
        let app = define_routes(test_app_state());

        let cookie = login(&app, "karol").await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/users")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "data": [] }));
    }

    #[tokio::test]
    async fn login_rejects_empty_nickname() {
        let app = define_routes(test_app_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header(
                        header::CONTENT_TYPE,
                        "application/x-www-form-urlencoded",
                    )
                    .body(Body::from("nickname="))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_clears_the_session_cookie() {
        let app = define_routes(test_app_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        assert!(response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .starts_with("SzmaterlokSession=;"));
    }

    #[tokio::test]
    async fn send_message_returns_accepted_with_message_id() {
        let app = define_routes(test_app_state());
        let cookie = login(&app, "karol").await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/message")
                    .header(header::COOKIE, cookie)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"content":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["data"]["id"].is_string());
    }

    #[tokio::test]
    async fn send_message_rejects_malformed_and_oversize_bodies() {
        let app = define_routes(test_app_state());
        let cookie = login(&app, "karol").await;

        let malformed = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/message")
                    .header(header::COOKIE, cookie.clone())
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

        let oversize = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/message")
                    .header(header::COOKIE, cookie)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(format!(
                        r#"{{"content":"{}"}}"#,
                        "x".repeat(300)
                    )))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(oversize.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_check_responds_without_authentication() {
        let app = define_routes(test_app_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn sent_message_reaches_live_subscribers() {
        let fanout = Arc::new(MessageFanout::new());
        let mut router = BridgeEventRouter::new();
        router.hook(BridgeEventType::Glob, fanout.clone());
        let bridge = Arc::new(Bridge::new(Some(Arc::new(router))));

        let app_state = app_state_with_bridge(bridge.clone(), fanout);
        let app = define_routes(app_state.clone());

        // Client B holds a live subscription through the full notifier
        // chain.
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let unsubscribe = app_state.notifier.subscribe(StreamSubscribeRequest {
            session: Some(app_state.state_factory.make_state("bob")),
            request_id: "req-b".to_owned(),
            last_event_id: None,
            channel: tx,
        });

        // Client A posts a message over http.
        let cookie = login(&app, "karol").await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/message")
                    .header(header::COOKIE, cookie)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"content":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let accepted: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let message_id = accepted["data"]["id"].as_str().unwrap().to_owned();

        // B's subscription also carries its own user-join event, so
        // skip until the message-sent delivery arrives.
        let message = loop {
            let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for message-sent delivery")
                .expect("subscriber channel closed unexpectedly");

            if event.event_type == "message-sent" {
                break event;
            }
        };

        assert_eq!(message.id.as_deref(), Some(message_id.as_str()));
        let payload: serde_json::Value = serde_json::from_slice(&message.data).unwrap();
        assert_eq!(payload["id"], message_id.as_str());
        assert_eq!(payload["from"]["nickname"], "karol");
        assert_eq!(payload["content"], "hi");

        unsubscribe.unsubscribe();
        bridge.shutdown(std::time::Duration::from_secs(5)).await;
    }
}
