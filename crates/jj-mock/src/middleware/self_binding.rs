use super::{Middleware, Next};
use crate::request::Request;
use crate::resolver::HandlerResult;
use async_trait::async_trait;

/// Root middleware that hands the owning app instance to two-argument
/// handlers. Single-argument handlers only receive the request.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfMiddleware;

#[async_trait]
impl Middleware for SelfMiddleware {
    fn name(&self) -> &str {
        "self"
    }

    async fn handle(&self, request: Request, next: Next<'_>) -> HandlerResult {
        if next.handler().arity() == 2 {
            next.bind_app().run(request).await
        } else {
            next.run(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{App, AppId, Handler};
    use crate::response::{DispatchError, Response};
    use std::sync::Arc;

    struct Greeter {
        greeting: &'static str,
    }

    fn greeter_app() -> App {
        App::new(AppId::new("greeter"), Arc::new(Greeter { greeting: "hello" }))
    }

    #[tokio::test]
    async fn test_binds_app_for_bound_handler() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(SelfMiddleware)];
        let handler = Handler::bound("greet", |greeter: Arc<Greeter>, _request| async move {
            Ok(Response::text(greeter.greeting))
        });
        let app = greeter_app();

        let response = Next::new(&chain, &handler, &app)
            .run(Request::new("GET", "/"))
            .await
            .unwrap();
        assert_eq!(response.body_bytes().unwrap().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_bound_handler_without_self_middleware_fails() {
        let handler = Handler::bound("greet", |greeter: Arc<Greeter>, _request| async move {
            Ok(Response::text(greeter.greeting))
        });
        let app = greeter_app();

        let err = Next::new(&[], &handler, &app)
            .run(Request::new("GET", "/"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnboundHandler(name) if name == "greet"));
    }

    #[tokio::test]
    async fn test_plain_handler_only_gets_request() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(SelfMiddleware)];
        let handler = Handler::new("echo", |request: Request| async move {
            Ok(Response::text(request.path().to_string()))
        });
        let app = greeter_app();

        let response = Next::new(&chain, &handler, &app)
            .run(Request::new("GET", "/echo"))
            .await
            .unwrap();
        assert_eq!(response.body_bytes().unwrap().as_ref(), b"/echo");
    }

    #[tokio::test]
    async fn test_wrong_app_type_is_reported() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(SelfMiddleware)];
        let handler = Handler::bound("greet", |greeter: Arc<Greeter>, _request| async move {
            Ok(Response::text(greeter.greeting))
        });
        let app = App::detached(AppId::new("other"));

        let err = Next::new(&chain, &handler, &app)
            .run(Request::new("GET", "/"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::AppMismatch { .. }));
    }
}
