mod common;
use common::ENV_LOCK;

use redash_mcp::app::App;
use redash_mcp::errors::ToolErrorKind;
use redash_mcp::mcp::catalog::tool_catalog;

fn clear_redash_env() {
    std::env::remove_var("REDASH_URL");
    std::env::remove_var("REDASH_API_KEY");
    std::env::remove_var("REDASH_TIMEOUT");
}

#[tokio::test]
async fn startup_fails_without_connection_settings() {
    let _guard = ENV_LOCK.lock().await;
    clear_redash_env();

    let err = App::initialize().unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::Config);
    assert!(err.message.contains("REDASH_URL and REDASH_API_KEY"));
}

#[tokio::test]
async fn startup_rejects_an_unparseable_base_url() {
    let _guard = ENV_LOCK.lock().await;
    std::env::set_var("REDASH_URL", "not a url");
    std::env::set_var("REDASH_API_KEY", "k");

    let err = App::initialize().unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::Config);
    clear_redash_env();
}

#[tokio::test]
async fn every_catalog_tool_has_a_wired_handler() {
    let _guard = ENV_LOCK.lock().await;
    std::env::set_var("REDASH_URL", "http://127.0.0.1:9");
    std::env::set_var("REDASH_API_KEY", "k");
    std::env::remove_var("REDASH_TIMEOUT");

    let app = App::initialize().expect("app must initialize");
    for tool in tool_catalog() {
        assert!(
            app.tool_executor.has_handler(&tool.name),
            "tool {} has no handler",
            tool.name
        );
    }
    clear_redash_env();
}
