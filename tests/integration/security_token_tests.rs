//! CSRF token integration tests

#[cfg(test)]
mod tests {
    use crate::common::fixtures::{
        PartResponse, ResponseItem, SERVICE_URL, batch_response, json_response,
    };
    use crate::common::{RecordingModel, ScriptedTransport};
    use odata_requestor::{
        GroupLock, HttpMethod, HttpResponse, MultipartBatchCodec, ODataRequest, Requestor,
        RequestorConfig,
    };
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn requestor(transport: Arc<ScriptedTransport>) -> Requestor {
        Requestor::new(
            RequestorConfig::new(SERVICE_URL),
            transport,
            Arc::new(MultipartBatchCodec::new()),
            RecordingModel::new(),
        )
        .unwrap()
    }

    fn token_required() -> HttpResponse {
        HttpResponse::new(403).with_header("X-CSRF-Token", "Required")
    }

    #[tokio::test]
    async fn test_batch_retried_with_fresh_token() {
        let transport = ScriptedTransport::new(|request| {
            match (request.method, request.headers.get("X-CSRF-Token")) {
                (HttpMethod::Head, _) => HttpResponse::new(200).with_header("X-CSRF-Token", "t-1"),
                (HttpMethod::Post, Some("t-1")) => batch_response(&[ResponseItem::Single(
                    PartResponse::json(201, "Created", json!({"ID": "1"})),
                )]),
                _ => token_required(),
            }
        });
        let requestor = requestor(transport.clone());

        let create = requestor
            .request(
                ODataRequest::post("Products").body(json!({"ID": "1"})),
                Some(&GroupLock::new("update")),
            )
            .unwrap();
        requestor.submit_batch("update").await.unwrap();

        assert_eq!(create.await.unwrap(), json!({"ID": "1"}));
        assert_eq!(requestor.security_token(), "t-1");
        let posts = transport.requests_with(HttpMethod::Post);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].body, posts[1].body);
    }

    #[tokio::test]
    async fn test_expired_token_is_replaced() {
        let token = Arc::new(Mutex::new("old".to_string()));
        let server_token = token.clone();
        let transport = ScriptedTransport::new(move |request| {
            let current = server_token.lock().clone();
            match request.method {
                HttpMethod::Head => HttpResponse::new(200).with_header("X-CSRF-Token", current),
                HttpMethod::Get => json_response(200, json!({})).with_header("X-CSRF-Token", current),
                _ if request.headers.get("X-CSRF-Token") == Some(current.as_str()) => {
                    json_response(200, json!({"ok": true}))
                }
                _ => token_required(),
            }
        });
        let requestor = requestor(transport.clone());

        requestor
            .request(ODataRequest::get("Products"), None)
            .unwrap()
            .await
            .unwrap();
        assert_eq!(requestor.security_token(), "old");

        *token.lock() = "new".to_string();
        let value = requestor
            .request(ODataRequest::post("Products('1')/Activate").body(json!({})), None)
            .unwrap()
            .await
            .unwrap();

        assert_eq!(value, json!({"ok": true}));
        assert_eq!(requestor.security_token(), "new");
        assert_eq!(transport.requests_with(HttpMethod::Head).len(), 1);
    }

    #[tokio::test]
    async fn test_outdated_refresh_request_is_not_repeated() {
        let transport = ScriptedTransport::new(|request| match request.method {
            HttpMethod::Head => HttpResponse::new(200).with_header("X-CSRF-Token", "fresh"),
            _ => json_response(200, json!({})).with_header("X-CSRF-Token", "current"),
        });
        let requestor = requestor(transport.clone());

        requestor
            .request(ODataRequest::get("Products"), None)
            .unwrap()
            .await
            .unwrap();

        // somebody else already replaced "stale"
        requestor
            .refresh_security_token(Some("stale".to_string()))
            .await
            .unwrap();
        assert_eq!(requestor.security_token(), "current");
        assert!(transport.requests_with(HttpMethod::Head).is_empty());

        requestor
            .refresh_security_token(Some("current".to_string()))
            .await
            .unwrap();
        assert_eq!(requestor.security_token(), "fresh");
        assert_eq!(transport.requests_with(HttpMethod::Head).len(), 1);
    }

    #[tokio::test]
    async fn test_missing_token_on_fetch_resets_to_fetch() {
        let transport = ScriptedTransport::new(|request| match request.method {
            HttpMethod::Head => HttpResponse::new(200),
            _ => json_response(200, json!({})).with_header("X-CSRF-Token", "t"),
        });
        let requestor = requestor(transport);

        requestor
            .request(ODataRequest::get("Products"), None)
            .unwrap()
            .await
            .unwrap();
        requestor
            .refresh_security_token(Some("t".to_string()))
            .await
            .unwrap();

        assert_eq!(requestor.security_token(), "Fetch");
    }
}
