use super::*;
use crate::expiration::ExpirationPolicy;
use crate::history::HistoryRepository;
use crate::matcher::RequestMatcher;
use crate::packing::{Pack, UnpackContext};
use crate::request::{Request, REMOTE_MOCK_HEADER};
use crate::resolver::Resolver;
use crate::response::{Response, ResponseTemplate, StaticResponse};
use crate::server::Dispatcher;
use serde_json::{json, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

fn setup() -> (Arc<MockService>, Dispatcher) {
    let resolver = Arc::new(Resolver::reversed(not_found_handler()));
    let service = Arc::new(MockService::new(
        Arc::clone(&resolver),
        HistoryRepository::new(),
        UnpackContext::default(),
    ));
    let app = Arc::clone(&service).install().unwrap();
    (service, Dispatcher::new(resolver, app))
}

fn control(method: &str, path: &str, body: Value) -> Request {
    Request::new(method, path)
        .with_header(REMOTE_MOCK_HEADER, "1")
        .with_body(body.to_string())
}

fn register_body(id: &str, matcher: &RequestMatcher, response: StaticResponse) -> Value {
    json!({
        "id": id,
        "request": matcher.pack().unwrap(),
        "response": ResponseTemplate::from(response).pack().unwrap(),
        "expiration_policy": null,
    })
}

fn body_json(response: &Response) -> Value {
    serde_json::from_slice(response.body_bytes().unwrap()).unwrap()
}

fn body_text(response: &Response) -> String {
    String::from_utf8(response.body_bytes().unwrap().to_vec()).unwrap()
}

fn post_users() -> RequestMatcher {
    RequestMatcher::all(vec![
        RequestMatcher::method("POST"),
        RequestMatcher::path("/users").unwrap(),
    ])
    .unwrap()
}

async fn register(dispatcher: &Dispatcher, id: &str, matcher: &RequestMatcher, body: &str) {
    let response = dispatcher
        .dispatch(control(
            "POST",
            "/__jj__/register",
            register_body(id, matcher, StaticResponse::text(body)),
        ))
        .await;
    assert_eq!(response.status(), 200, "{}", body_text(&response));
}

async fn history(dispatcher: &Dispatcher, id: &str) -> Response {
    dispatcher
        .dispatch(control("GET", "/__jj__/history", json!({ "id": id })))
        .await
}

#[tokio::test]
async fn test_registered_mock_serves_and_records() {
    let (service, dispatcher) = setup();
    register(&dispatcher, "users", &post_users(), "[]").await;

    let response = dispatcher
        .dispatch(Request::new("POST", "/users").with_body("{\"name\":\"a\"}"))
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_text(&response), "[]");

    let response = history(&dispatcher, "users").await;
    assert_eq!(response.status(), 200);
    let items = body_json(&response);
    assert_eq!(items.as_array().unwrap().len(), 1);
    let request = &items[0]["HistoryItem"]["request"]["HistoryRequest"];
    assert_eq!(request["method"], "POST");
    assert_eq!(request["path"], "/users");
    assert_eq!(service.history().len(), 1);
}

#[tokio::test]
async fn test_unmatched_request_is_not_recorded() {
    let (service, dispatcher) = setup();
    register(&dispatcher, "users", &post_users(), "[]").await;

    let response = dispatcher.dispatch(Request::new("GET", "/other")).await;
    assert_eq!(response.status(), 404);
    assert_eq!(body_text(&response), "Not Found");
    assert!(service.history().is_empty());
}

#[tokio::test]
async fn test_last_registered_mock_wins() {
    let (_service, dispatcher) = setup();
    let matcher = RequestMatcher::method("GET");
    register(&dispatcher, "first", &matcher, "text1").await;
    register(&dispatcher, "second", &matcher, "text2").await;

    let response = dispatcher.dispatch(Request::new("GET", "/")).await;
    assert_eq!(body_text(&response), "text2");
}

#[tokio::test]
async fn test_reregistering_id_replaces_handler() {
    let (service, dispatcher) = setup();
    let matcher = RequestMatcher::method("GET");
    register(&dispatcher, "same", &matcher, "old").await;
    register(&dispatcher, "same", &matcher, "new").await;

    let response = dispatcher.dispatch(Request::new("GET", "/")).await;
    assert_eq!(body_text(&response), "new");
    let handlers = service.resolver().get_handlers(service.resolver().default_app());
    assert_eq!(handlers.len(), 1);
}

#[tokio::test]
async fn test_expiring_mock_falls_through() {
    let (_service, dispatcher) = setup();
    let mut body = register_body(
        "once",
        &RequestMatcher::method("GET"),
        StaticResponse::text("hi"),
    );
    body["expiration_policy"] = ExpirationPolicy::after_requests(1).unwrap().pack().unwrap();
    let response = dispatcher
        .dispatch(control("POST", "/__jj__/register", body))
        .await;
    assert_eq!(response.status(), 200);

    let first = dispatcher.dispatch(Request::new("GET", "/")).await;
    assert_eq!(first.status(), 200);
    let second = dispatcher.dispatch(Request::new("GET", "/")).await;
    assert_eq!(second.status(), 404);
}

#[tokio::test]
async fn test_deregister_purges_history() {
    let (service, dispatcher) = setup();
    register(&dispatcher, "users", &post_users(), "[]").await;
    dispatcher.dispatch(Request::new("POST", "/users")).await;
    assert_eq!(service.history().len(), 1);

    let response = dispatcher
        .dispatch(control("DELETE", "/__jj__/deregister", json!({"id": "users"})))
        .await;
    assert_eq!(response.status(), 200);
    assert!(service.history().is_empty());

    let response = dispatcher.dispatch(Request::new("POST", "/users")).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_deregister_unknown_is_noop_but_history_is_not() {
    let (_service, dispatcher) = setup();

    let response = dispatcher
        .dispatch(control("DELETE", "/__jj__/deregister", json!({"id": "ghost"})))
        .await;
    assert_eq!(response.status(), 200);

    let response = history(&dispatcher, "ghost").await;
    assert_eq!(response.status(), 400);
    assert_eq!(body_json(&response)["error"], "Handler not found");
}

#[tokio::test]
async fn test_invalid_register_reports_every_field() {
    let (_service, dispatcher) = setup();
    let response = dispatcher
        .dispatch(control(
            "POST",
            "/__jj__/register",
            json!({"request": {"NopeMatcher": {}}, "response": 5}),
        ))
        .await;

    assert_eq!(response.status(), 400);
    let body = body_json(&response);
    assert_eq!(body["status"], 400);
    assert_eq!(body["error"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_reset_removes_everything() {
    let (service, dispatcher) = setup();
    register(&dispatcher, "a", &RequestMatcher::method("GET"), "a").await;
    register(&dispatcher, "b", &post_users(), "b").await;
    dispatcher.dispatch(Request::new("GET", "/")).await;

    let response = dispatcher
        .dispatch(control("POST", "/__jj__/reset", json!({})))
        .await;
    assert_eq!(body_json(&response)["removed"], 2);
    assert!(service.history().is_empty());

    let response = dispatcher.dispatch(Request::new("GET", "/")).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_control_routes_require_header() {
    let (service, dispatcher) = setup();
    let request = Request::new("POST", "/__jj__/register").with_body(
        register_body("x", &RequestMatcher::method("GET"), StaticResponse::text("x")).to_string(),
    );

    let response = dispatcher.dispatch(request).await;
    assert_eq!(response.status(), 404);
    assert!(service
        .resolver()
        .get_handlers(service.resolver().default_app())
        .is_empty());
}

#[tokio::test]
async fn test_unknown_control_route() {
    let (_service, dispatcher) = setup();
    let response = dispatcher
        .dispatch(control("PATCH", "/__jj__/register", json!({})))
        .await;
    assert_eq!(response.status(), 404);
    assert!(body_json(&response)["error"]
        .as_str()
        .unwrap()
        .contains("PATCH"));
}

#[tokio::test]
async fn test_introspection() {
    let (_service, dispatcher) = setup();
    register(&dispatcher, "a", &RequestMatcher::method("GET"), "a").await;
    register(&dispatcher, "b", &post_users(), "b").await;
    dispatcher
        .dispatch(
            Request::new("POST", "/users")
                .with_header("content-type", "application/json")
                .with_body("{\"n\":1}"),
        )
        .await;

    let summary = dispatcher
        .dispatch(control("GET", "/__jj__", json!({})))
        .await;
    let summary = body_json(&summary);
    assert_eq!(summary["handlers"], 2);
    assert_eq!(summary["history"], 1);

    let list = dispatcher
        .dispatch(control("GET", "/__jj__/handlers", json!({})))
        .await;
    let list = body_json(&list);
    assert_eq!(list[0]["id"], "b");
    assert_eq!(list[1]["id"], "a");
    assert_eq!(list[0]["response"], "Response");
    assert_eq!(list[0]["history"], 1);

    let detail = dispatcher
        .dispatch(control("GET", "/__jj__/handlers/b", json!({})))
        .await;
    assert_eq!(detail.status(), 200);
    let detail = body_json(&detail);
    assert_eq!(detail["items"][0]["request"]["body"], json!({"n": 1}));

    let missing = dispatcher
        .dispatch(control("GET", "/__jj__/handlers/nope", json!({})))
        .await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_route_segments_reach_template() {
    let (_service, dispatcher) = setup();
    let matcher = RequestMatcher::path("/users/{id}").unwrap();
    let body = json!({
        "id": "tpl",
        "request": matcher.pack().unwrap(),
        "response": {"TemplateResponse": {"body": "user ${request.segments.id}"}},
    });
    let response = dispatcher
        .dispatch(control("POST", "/__jj__/register", body))
        .await;
    assert_eq!(response.status(), 200);

    let response = dispatcher.dispatch(Request::new("GET", "/users/42")).await;
    assert_eq!(body_text(&response), "user 42");
}

#[test]
fn test_concurrent_install_respects_budgets() {
    let (service, _) = setup();
    let resolver = Arc::clone(service.resolver());
    let served: Mutex<HashMap<String, usize>> = Mutex::new(HashMap::new());
    let unidentified = AtomicUsize::new(0);
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    let mut request = Request::new("GET", "/");
                    let (handler, id) =
                        resolver.resolve_identified(&mut request, resolver.default_app());
                    match id {
                        Some(id) => *served.lock().entry(id).or_insert(0) += 1,
                        None if handler != *resolver.default_handler() => {
                            unidentified.fetch_add(1, Ordering::SeqCst);
                        }
                        None => {}
                    }
                }
            });
        }
        for round in 0..500 {
            service.install_remote(
                &format!("h{round}"),
                RequestMatcher::method("GET"),
                StaticResponse::text("x").into(),
                Some(ExpirationPolicy::after_requests(1).unwrap()),
            );
            if round % 7 == 0 {
                service.remove_remote(&format!("h{round}"));
            }
        }
        done.store(true, Ordering::SeqCst);
    });

    assert_eq!(unidentified.load(Ordering::SeqCst), 0);
    let served = served.into_inner();
    assert!(served.values().all(|count| *count <= 1), "{served:?}");
    assert!(served.keys().all(|id| id.starts_with('h')));
}
