//! End-to-end tests for the helper bot service loop.
//!
//! These tests drive the real dispatcher, scheduler and supervisor over an
//! in-memory transport with fixture catalogs and canned detail probes, so
//! nothing touches the network and nothing actually sleeps.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use pcsx2_helper_bot::backoff::{
    BackoffConfig, RecordingSleeper, RunEnd, Scheduler, SchedulerState, run_supervised,
};
use pcsx2_helper_bot::catalog::{
    Catalog, CatalogEntry, EntryDetail, GameReport, RegionStatus,
};
use pcsx2_helper_bot::compose::Composer;
use pcsx2_helper_bot::config::{BotConfig, CatalogBotConfig, HelpBotConfig};
use pcsx2_helper_bot::dispatch::Dispatcher;
use pcsx2_helper_bot::error::{CatalogResult, TransportError};
use pcsx2_helper_bot::resolve::EntityResolver;
use pcsx2_helper_bot::responder::{CatalogResponder, DetailProbe, HelpResponder, Responder};
use pcsx2_helper_bot::transport::{Comment, MockTransport};

const BOT: &str = "PCSX2-Helper-Bot";

struct Canned(EntryDetail);

impl DetailProbe for Canned {
    fn probe(&self, _entry: &CatalogEntry) -> CatalogResult<EntryDetail> {
        Ok(self.0.clone())
    }
}

fn responder(config: &CatalogBotConfig, catalog: Catalog, detail: EntryDetail) -> CatalogResponder {
    let responder = CatalogResponder::new(
        &config.name,
        &config.phrase,
        &config.usage,
        catalog,
        EntityResolver::new(config.resolver.clone()).unwrap(),
        Composer::new(config.reply.clone(), config.tiers.clone(), &config.usage),
        Box::new(Canned(detail)),
    );
    match &config.appendix {
        Some(text) => responder.with_appendix(text),
        None => responder,
    }
}

/// The production bot line-up with fixture catalogs.
fn dispatcher() -> Dispatcher {
    let defaults = BotConfig::default();
    let cpus = Catalog::from_entries([
        CatalogEntry::new("AMD Ryzen 5 3600", "https://www.cpubenchmark.net/cpu.php?id=3481"),
        CatalogEntry::new("Intel Core i7-4790K", "https://www.cpubenchmark.net/cpu.php?id=2275"),
    ]);
    let gpus = Catalog::from_entries([CatalogEntry::new(
        "GeForce GTX 1060 6GB",
        "https://www.videocardbenchmark.net/gpu.php?id=3548",
    )]);
    let games = Catalog::from_entries([CatalogEntry::new(
        "Okami",
        "https://wiki.pcsx2.net/Okami",
    )]);
    let report = GameReport {
        regions: vec![RegionStatus {
            region: "NTSC-U".into(),
            statuses: vec![("Windows".into(), "Playable".into())],
        }],
        active_issues: vec!["Minor flickering in menus".into()],
        fixed_issues: Vec::new(),
    };

    let responders: Vec<Box<dyn Responder>> = vec![
        Box::new(responder(&CatalogBotConfig::cpu(), cpus, EntryDetail::Metric(2542))),
        Box::new(responder(&CatalogBotConfig::gpu(), gpus, EntryDetail::Metric(10091))),
        Box::new(responder(
            &CatalogBotConfig::wiki(),
            games,
            EntryDetail::Compatibility(report),
        )),
        Box::new(HelpResponder::from_config(&HelpBotConfig::default())),
    ];
    Dispatcher::new(responders, defaults.bot.footer).unwrap()
}

fn rate_limited() -> TransportError {
    TransportError::Api {
        message: "RATELIMIT: 'Looks like you've been doing that a lot. Take a break for 3 \
                  minutes before trying again.' on field 'ratelimit'"
            .into(),
    }
}

fn server_error() -> TransportError {
    TransportError::Http {
        url: "https://oauth.reddit.com/api/comment".into(),
        message: "HTTP 500: internal server error".into(),
    }
}

fn secs(d: &[Duration]) -> Vec<u64> {
    d.iter().map(Duration::as_secs).collect()
}

#[test]
fn multi_bot_comment_gets_one_composed_reply() {
    let dispatcher = dispatcher();
    let mut transport = MockTransport::new(BOT);
    transport.push_comment(Comment::new(
        "c1",
        "alice",
        "My rig:\nCPUBot! ryzen 5 3600, i7 4790k\nWikiBot! okami",
    ));

    let sleeper = RecordingSleeper::new();
    let shutdown = Arc::new(AtomicBool::new(false));
    let (end, stats) = run_supervised(
        &dispatcher,
        &mut transport,
        BackoffConfig::default(),
        &sleeper,
        shutdown,
    );

    assert_eq!(end, RunEnd::StreamEnded);
    assert_eq!(stats.replied, 1);
    assert!(sleeper.slept().is_empty());

    let replies = transport.replies();
    assert_eq!(replies.len(), 1);
    let (id, body) = &replies[0];
    assert_eq!(id, "c1");
    assert!(body.starts_with("### **AMD Ryzen 5 3600**"));
    assert!(body.contains("**CPU STR:** [2542 (CPU Benchmark Page)]"));
    assert!(body.contains("**Performance:** Great for most games"));
    assert!(body.contains("### **Intel Core i7-4790K**"));
    assert!(body.contains("## [Okami](https://wiki.pcsx2.net/Okami)"));
    assert!(body.contains("Minor flickering in menus"));
    assert_eq!(body.matches("should only be used as a rough guide").count(), 1);
    assert!(body.trim_end().ends_with("[^GitHub](https://github.com/Pixxel123/PCSX2-Helper-Bot)"));
    assert!(transport.is_handled("c1"));
}

#[test]
fn chatter_and_own_comments_are_skipped() {
    let dispatcher = dispatcher();
    let mut transport = MockTransport::new(BOT);
    transport.push_comment(Comment::new("c1", "alice", "Does anyone know a good GPU?"));
    transport.push_comment(Comment::new("c2", BOT, "CPUBot! ryzen 5 3600"));

    let sleeper = RecordingSleeper::new();
    let (end, stats) = run_supervised(
        &dispatcher,
        &mut transport,
        BackoffConfig::default(),
        &sleeper,
        Arc::new(AtomicBool::new(false)),
    );

    assert_eq!(end, RunEnd::StreamEnded);
    assert_eq!(stats.skipped, 2);
    assert!(transport.replies().is_empty());
    assert!(transport.handled().is_empty());
}

#[test]
fn helper_and_usage_replies() {
    let dispatcher = dispatcher();
    let reply = dispatcher
        .compose_reply("HelperBot! support\n\nGPUBot!")
        .unwrap()
        .unwrap();
    assert!(reply.starts_with("I need a search term to work with! Please try `GPUBot! gpu model`"));
    assert!(reply.contains("### **Getting Help on r/PCSX2**"));
    assert!(!reply.contains("rough guide"));
}

#[test]
fn unknown_model_gets_an_apology_without_disclaimer() {
    let dispatcher = dispatcher();
    let reply = dispatcher.compose_reply("GPUBot! voodoo 5 5500").unwrap().unwrap();
    assert!(reply.starts_with("I'm sorry, I couldn't find any information on **voodoo 5 5500**"));
    assert!(reply.contains("[Passmark GPU list](https://www.videocardbenchmark.net/gpu_list.php)"));
    assert!(!reply.contains("rough guide"));
}

#[test]
fn gpu_variant_within_acceptance_is_matched() {
    let dispatcher = dispatcher();
    let reply = dispatcher.compose_reply("GPUBot! gtx 1060").unwrap().unwrap();
    assert!(reply.starts_with("### **GeForce GTX 1060 6GB**"));
    assert!(reply.contains("**Performance:** 6x Native (~4K)"));
}

#[test]
fn rate_limited_reply_is_retried_once_after_the_wait() {
    let dispatcher = dispatcher();
    let mut transport = MockTransport::new(BOT);
    transport.push_comment(Comment::new("c1", "alice", "CPUBot! ryzen 5 3600"));
    transport.fail_next_reply(rate_limited());

    let sleeper = RecordingSleeper::new();
    let (end, stats) = run_supervised(
        &dispatcher,
        &mut transport,
        BackoffConfig::default(),
        &sleeper,
        Arc::new(AtomicBool::new(false)),
    );

    assert_eq!(end, RunEnd::StreamEnded);
    assert_eq!(stats.rate_limits, 1);
    assert_eq!(stats.replied, 1);
    // 3 minutes plus the 60 s margin, counted down in 5 s steps.
    assert_eq!(sleeper.total(), Duration::from_secs(240));
    assert_eq!(sleeper.slept().len(), 48);
    assert_eq!(transport.replies().len(), 1);
    assert!(transport.is_handled("c1"));
}

#[test]
fn failed_comment_is_marked_and_not_retried() {
    let dispatcher = dispatcher();
    let mut transport = MockTransport::new(BOT);
    transport.push_comment(Comment::new("c1", "alice", "CPUBot! ryzen 5 3600"));
    // The stream delivers the same comment again; it must be skipped.
    transport.push_comment(Comment::new("c1", "alice", "CPUBot! ryzen 5 3600"));
    transport.fail_next_reply(server_error());

    let sleeper = RecordingSleeper::new();
    let (end, stats) = run_supervised(
        &dispatcher,
        &mut transport,
        BackoffConfig::default(),
        &sleeper,
        Arc::new(AtomicBool::new(false)),
    );

    assert_eq!(end, RunEnd::StreamEnded);
    assert_eq!(stats.faults, 1);
    assert_eq!(stats.skipped, 1);
    assert!(transport.replies().is_empty());
    assert_eq!(transport.handled(), &["c1".to_string()]);
    assert_eq!(secs(&sleeper.slept()), vec![5, 5, 5]);
}

#[test]
fn stream_fault_waits_default_delay() {
    let dispatcher = dispatcher();
    let mut transport = MockTransport::new(BOT);
    transport.fail_next_poll(TransportError::Http {
        url: "https://oauth.reddit.com/r/pcsx2/comments".into(),
        message: "connection reset".into(),
    });
    transport.push_comment(Comment::new("c1", "alice", "WikiBot! okami"));

    let sleeper = RecordingSleeper::new();
    let (end, stats) = run_supervised(
        &dispatcher,
        &mut transport,
        BackoffConfig::default(),
        &sleeper,
        Arc::new(AtomicBool::new(false)),
    );

    assert_eq!(end, RunEnd::StreamEnded);
    assert_eq!(stats.faults, 1);
    assert_eq!(stats.replied, 1);
    assert_eq!(sleeper.total(), Duration::from_secs(15));
}

#[test]
fn fault_during_recovery_restarts_after_twenty_seconds() {
    let dispatcher = dispatcher();
    let mut transport = MockTransport::new(BOT);
    transport.push_comment(Comment::new("c1", "alice", "CPUBot! ryzen 5 3600"));
    transport.push_comment(Comment::new("c2", "bob", "WikiBot! okami"));
    transport.fail_next_reply(server_error());
    transport.fail_next_mark(server_error());

    let sleeper = RecordingSleeper::new();
    let (end, stats) = run_supervised(
        &dispatcher,
        &mut transport,
        BackoffConfig::default(),
        &sleeper,
        Arc::new(AtomicBool::new(false)),
    );

    assert_eq!(end, RunEnd::StreamEnded);
    assert_eq!(secs(&sleeper.slept()), vec![20]);
    // The restarted run picks up where the stream left off.
    assert_eq!(stats.replied, 1);
    assert_eq!(transport.replies()[0].0, "c2");
    assert!(!transport.is_handled("c1"));
}

#[test]
fn shutdown_interrupts_a_rate_limit_wait() {
    let dispatcher = dispatcher();
    let mut transport = MockTransport::new(BOT);
    transport.push_comment(Comment::new("c1", "alice", "CPUBot! ryzen 5 3600"));
    transport.push_comment(Comment::new("c2", "bob", "WikiBot! okami"));
    transport.fail_next_reply(rate_limited());

    let shutdown = Arc::new(AtomicBool::new(false));
    let sleeper = RecordingSleeper::stopping_after(2, Arc::clone(&shutdown));
    let mut scheduler = Scheduler::new(BackoffConfig::default(), &sleeper, shutdown);

    let end = scheduler.run(&dispatcher, &mut transport).unwrap();
    assert_eq!(end, RunEnd::Shutdown);
    assert_eq!(scheduler.state(), SchedulerState::Running);
    assert_eq!(sleeper.slept().len(), 2);
    assert!(transport.replies().is_empty());
    assert_eq!(transport.pending(), 1);
}
