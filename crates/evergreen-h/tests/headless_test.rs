use evergreen_engine::backend::Backend;
use evergreen_engine::protocol::{ClickMode, Query};
use evergreen_h::backend::HeadlessBackend;
use evergreen_h::cdp::LaunchOptions;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn headless_lifecycle_and_probe() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::INFO)
        .try_init()
        .ok();

    let mut backend = HeadlessBackend::new(LaunchOptions::default());

    match backend.launch().await {
        Ok(_) => {}
        Err(e) => {
            eprintln!("Failed to launch browser (is Chromium installed?): {}", e);
            return;
        }
    }

    let html = "<html><head><title>Probe Page</title></head><body>\
        <div id='box'><button id='btn' onclick='this.innerText=\"Clicked\"'>Press Me</button></div>\
        <input name='field' value=''>\
        <p style='display:none' id='ghost'>hidden</p>\
        </body></html>";
    let url = format!("data:text/html,{}", html);

    let nav = backend.navigate(&url).await.expect("navigation failed");
    assert_eq!(nav.title, "Probe Page");

    // CSS query sees visibility and enablement.
    let button = backend
        .query(&Query::css("#btn"))
        .await
        .expect("query failed")
        .expect("button must exist");
    assert!(button.visible);
    assert!(button.enabled);

    // Hidden elements are reported, but not as visible.
    let ghost = backend
        .query(&Query::css("#ghost"))
        .await
        .expect("query failed")
        .expect("ghost must exist");
    assert!(!ghost.visible);

    // Text query with a scope.
    let scoped = backend
        .query(&Query::text("Press Me").within("#box"))
        .await
        .expect("query failed");
    assert!(scoped.is_some());

    // Forced click goes through the DOM.
    backend
        .click(&Query::css("#btn"), ClickMode::Forced)
        .await
        .expect("click failed");
    let button = backend
        .query(&Query::css("#btn"))
        .await
        .expect("query failed")
        .expect("button must exist");
    assert_eq!(button.text, "Clicked");

    // set_value round-trips through the probe.
    backend
        .set_value(&Query::css("input[name=\"field\"]"), "hello")
        .await
        .expect("set_value failed");
    let field = backend
        .query(&Query::css("input[name=\"field\"]"))
        .await
        .expect("query failed")
        .expect("field must exist");
    assert_eq!(field.value.as_deref(), Some("hello"));

    let shot = backend.screenshot().await.expect("screenshot failed");
    assert!(!shot.is_empty());

    backend.close().await.expect("close failed");
}
