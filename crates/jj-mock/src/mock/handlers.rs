//! Control-plane route handlers.

use super::service::MockService;
use super::types::{error_response, json_response, ok_response, HandlerRef, RegisterPayload};
use crate::history::HistoryItem;
use crate::metrics;
use crate::packing::pack_list;
use crate::request::Request;
use crate::resolver::HandlerResult;
use serde_json::json;
use tracing::{info, warn};

impl MockService {
    /// POST /__jj__/register
    pub(super) async fn register(&self, request: Request) -> HandlerResult {
        let payload = match RegisterPayload::parse(&request, &self.table) {
            Ok(payload) => payload,
            Err(errors) => {
                warn!("Rejected register payload: {}", errors.join("; "));
                metrics::record_registration("register", metrics::RESULT_INVALID);
                return Ok(error_response(400, errors));
            }
        };

        info!(
            id = %payload.id,
            matcher = %payload.matcher,
            response = payload.response.kind(),
            "Registering remote handler"
        );
        self.install_remote(
            &payload.id,
            payload.matcher,
            payload.response,
            payload.expiration_policy,
        );
        metrics::record_registration("register", metrics::RESULT_OK);
        Ok(ok_response(json!({ "id": payload.id })))
    }

    /// DELETE /__jj__/deregister
    pub(super) async fn deregister(&self, request: Request) -> HandlerResult {
        let target = match HandlerRef::parse(&request) {
            Ok(target) => target,
            Err(errors) => {
                metrics::record_registration("deregister", metrics::RESULT_INVALID);
                return Ok(error_response(400, errors));
            }
        };

        let removed = self.remove_remote(&target.id);
        info!(id = %target.id, removed, "Deregistered remote handler");
        metrics::record_registration("deregister", metrics::RESULT_OK);
        Ok(ok_response(json!({ "id": target.id })))
    }

    /// POST /__jj__/reset
    pub(super) async fn reset(&self, _request: Request) -> HandlerResult {
        let removed = self.clear();
        info!(removed, "Reset remote handlers");
        metrics::record_registration("reset", metrics::RESULT_OK);
        Ok(ok_response(json!({ "removed": removed })))
    }

    /// GET /__jj__/history
    pub(super) async fn fetch_history(&self, request: Request) -> HandlerResult {
        let target = match HandlerRef::parse(&request) {
            Ok(target) => target,
            Err(errors) => return Ok(error_response(400, errors)),
        };

        let default_app = self.resolver.default_app().clone();
        if self
            .resolver
            .find_handler_by_id(&default_app, &target.id)
            .is_none()
        {
            return Ok(error_response(400, "Handler not found"));
        }

        let items: Vec<HistoryItem> = self.history.get_by_tag(&target.id);
        match pack_list(&items) {
            Ok(packed) => Ok(json_response(200, &packed)),
            Err(e) => Ok(error_response(500, e.to_string())),
        }
    }

    /// GET /__jj__
    pub(super) async fn summary(&self, _request: Request) -> HandlerResult {
        Ok(json_response(200, &self.summary_json()))
    }

    /// GET /__jj__/handlers
    pub(super) async fn list_handlers(&self, _request: Request) -> HandlerResult {
        let handlers = self.resolver.get_handlers(self.resolver.default_app());
        let items: Vec<_> = handlers.iter().map(|h| self.describe(h)).collect();
        Ok(json_response(200, &json!(items)))
    }

    /// GET /__jj__/handlers/{id}
    pub(super) async fn handler_detail(&self, request: Request) -> HandlerResult {
        let Some(id) = request.segments().get("id") else {
            return Ok(error_response(400, "id: missing segment"));
        };
        let default_app = self.resolver.default_app().clone();
        let Some(handler) = self.resolver.find_handler_by_id(&default_app, id) else {
            return Ok(error_response(404, format!("Handler {id} not found")));
        };

        let mut detail = self.describe(&handler);
        let history: Vec<_> = self
            .history
            .get_by_tag(id)
            .iter()
            .map(|item| self.adapter.adapt(item))
            .collect();
        detail["items"] = json!(history);
        Ok(json_response(200, &detail))
    }
}
