//! Integration tests for handler composition.
//!
//! Exercises nested composites the way the server assembles them: a
//! first-match router over handlers that are themselves composites.

use async_trait::async_trait;
use podium_core::{
    AsyncHandler, BoxedHandler, Error, ErrorKind, FirstMatchHandler, FirstSuccessHandler,
    ParallelHandler, Result, RunAllHandler, StaticHandler,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

/// Accepts inputs starting with `prefix`, returns `output`, and records calls.
struct PrefixHandler {
    name: &'static str,
    prefix: &'static str,
    output: Option<&'static str>,
    log: Log,
}

impl PrefixHandler {
    fn boxed(
        name: &'static str,
        prefix: &'static str,
        output: Option<&'static str>,
        log: &Log,
    ) -> BoxedHandler<String, String> {
        Arc::new(Self {
            name,
            prefix,
            output,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl AsyncHandler<String, String> for PrefixHandler {
    async fn can_handle(&self, input: &String) -> Result<()> {
        if input.starts_with(self.prefix) {
            Ok(())
        } else {
            Err(Error::NotSupported(format!(
                "{} only handles {}",
                self.name, self.prefix
            )))
        }
    }

    async fn handle(&self, _input: &String) -> Result<String> {
        self.log.lock().unwrap().push(self.name.to_string());
        match self.output {
            Some(out) => Ok(out.to_string()),
            None => Err(Error::Conflict(format!("{} failed", self.name))),
        }
    }
}

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn calls(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn test_first_match_never_calls_rejecting_handler() {
    let log = log();
    let router = FirstMatchHandler::new(vec![
        PrefixHandler::boxed("A", "/a", Some("A"), &log),
        PrefixHandler::boxed("B", "/", Some("B"), &log),
    ]);

    let out = router.handle_safe(&"/b/resource".to_string()).await.unwrap();
    assert_eq!(out, "B");
    assert_eq!(calls(&log), vec!["B"]);
}

#[tokio::test]
async fn test_run_all_returns_last_and_stops_on_failure() {
    let log = log();
    let all = RunAllHandler::new(vec![
        PrefixHandler::boxed("X", "", Some("x"), &log),
        PrefixHandler::boxed("Y", "", Some("y"), &log),
        PrefixHandler::boxed("Z", "", Some("z"), &log),
    ]);
    let out = all.handle_safe(&"in".to_string()).await.unwrap();
    assert_eq!(out.as_deref(), Some("z"));
    assert_eq!(calls(&log), vec!["X", "Y", "Z"]);

    let log2 = self::log();
    let failing = RunAllHandler::new(vec![
        PrefixHandler::boxed("X", "", Some("x"), &log2),
        PrefixHandler::boxed("Y", "", None, &log2),
        PrefixHandler::boxed("Z", "", Some("z"), &log2),
    ]);
    let err = failing.handle_safe(&"in".to_string()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(calls(&log2), vec!["X", "Y"]);
}

#[tokio::test]
async fn test_nested_composites() {
    let log = log();
    let fallback: BoxedHandler<String, String> = Arc::new(StaticHandler::new("default".to_string()));
    let inner: BoxedHandler<String, String> = Arc::new(FirstSuccessHandler::new(vec![
        PrefixHandler::boxed("broken", "/api", None, &log),
        PrefixHandler::boxed("api", "/api", Some("api"), &log),
    ]));
    let router = FirstMatchHandler::new(vec![
        inner,
        PrefixHandler::boxed("never", "/nothing", Some("never"), &log),
        fallback,
    ]);

    assert_eq!(router.handle_safe(&"/api/x".to_string()).await.unwrap(), "api");
    assert_eq!(calls(&log), vec!["broken", "api"]);
    assert_eq!(router.handle_safe(&"/other".to_string()).await.unwrap(), "default");
}

#[tokio::test]
async fn test_parallel_inside_first_match() {
    let log = log();
    let parallel: Arc<dyn AsyncHandler<String, Vec<String>>> = Arc::new(ParallelHandler::new(vec![
        PrefixHandler::boxed("p1", "/p", Some("1"), &log),
        PrefixHandler::boxed("p2", "/p", Some("2"), &log),
    ]));
    let router = FirstMatchHandler::new(vec![parallel]);

    let out = router.handle_safe(&"/p".to_string()).await.unwrap();
    assert_eq!(out, vec!["1", "2"]);

    let err = router.handle_safe(&"/q".to_string()).await.unwrap_err();
    assert!(err.is_unsupported());
}
