//! Configuration loading tests

#[cfg(test)]
mod tests {
    use odata_requestor::{ODataVersion, RequestorConfig, RequestorError, SubmitMode};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_from_file() {
        let file = write_config(
            r#"
service_url: "https://host.example/sap/opu/odata/sap/ZSRV/"
odata_version: "2.0"
headers:
  accept-language: de
query_params:
  sap-client: "100"
session_keep_alive_limit_secs: 600
groups:
  update: API
  immediate: Direct
"#,
        );

        let config = RequestorConfig::from_file(file.path()).await.unwrap();

        assert_eq!(config.odata_version, ODataVersion::V2);
        assert_eq!(config.headers.get("Accept-Language"), Some("de"));
        assert_eq!(config.query_params.get("sap-client").map(String::as_str), Some("100"));
        assert_eq!(config.session_keep_alive_limit_secs, 600);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.groups.get("immediate"), Some(&SubmitMode::Direct));
        assert!(!config.is_change_set_optional());
    }

    #[tokio::test]
    async fn test_from_file_rejects_invalid_service_url() {
        let file = write_config("service_url: \"https://host.example/no-trailing-slash\"\n");

        let result = RequestorConfig::from_file(file.path()).await;

        assert!(matches!(result, Err(RequestorError::Config(_))));
    }

    #[tokio::test]
    async fn test_from_file_missing() {
        let result = RequestorConfig::from_file("/nonexistent/odata.yaml").await;

        let error = result.unwrap_err();
        assert!(error.to_string().contains("Failed to read config file"));
    }

    #[tokio::test]
    async fn test_yaml_round_trip_keeps_overrides() {
        let config = RequestorConfig::new("https://host.example/svc/")
            .with_change_set_optional(false)
            .with_group("$auto.side", SubmitMode::Auto);
        let file = write_config(&config.to_yaml().unwrap());

        let loaded = RequestorConfig::from_file(file.path()).await.unwrap();

        assert_eq!(loaded, config);
        assert!(!loaded.is_change_set_optional());
    }
}
