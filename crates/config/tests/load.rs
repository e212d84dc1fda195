use app_config::AppConfig;

#[test]
fn test_load_default_config() {
    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.http_port, 8080);
    assert!(!cfg.chat_enabled);
    assert_eq!(cfg.shutdown_timeout, std::time::Duration::from_secs(5));
}
