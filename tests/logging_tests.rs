use chargerkit::logging::{LogContext, get_logger_with_context, min_level, parse_log_level};
use tracing::Level;

#[test]
fn parse_log_level_accepts_aliases() {
    assert_eq!(parse_log_level("warning").unwrap(), Level::WARN);
    assert_eq!(parse_log_level("Debug").unwrap(), Level::DEBUG);
    assert!(parse_log_level("verbose").is_err());
}

#[test]
fn min_level_picks_more_verbose() {
    assert_eq!(min_level(Level::INFO, Level::DEBUG), Level::DEBUG);
    assert_eq!(min_level(Level::ERROR, Level::WARN), Level::WARN);
}

#[test]
fn logger_with_charger_context_logs_without_subscriber() {
    let ctx = LogContext::new("etrel")
        .with_charger("garage")
        .with_field("slave", "255".to_string());
    let logger = get_logger_with_context(ctx);
    logger.info("logger ok");
    logger.debug("registers read");
}
