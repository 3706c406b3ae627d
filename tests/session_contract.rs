// Session contract tests: token lifecycle, result mapping, and teardown.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use augeas_bridge::api::{
    EngineFault, Engine, ErrorKind, HostSession, InitFlags, MemoryEngine, Outcome, RawSpan,
    Session, SessionConfig,
};
use pretty_assertions::assert_eq;

fn memory_session() -> (tempfile::TempDir, String, HostSession<MemoryEngine>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().to_string_lossy().into_owned();
    let session = HostSession::new(MemoryEngine::new(), SessionConfig::default()).expect("session");
    (dir, root, session)
}

fn open(session: &mut HostSession<MemoryEngine>, root: &str) -> String {
    session
        .invoke("init", &[root])
        .expect("init")
        .token()
        .expect("token")
        .to_string()
}

fn kind_of(result: Result<Outcome, augeas_bridge::api::Error>) -> ErrorKind {
    result.expect_err("expected failure").kind()
}

#[test_log::test]
fn tokens_are_unique_across_inits_and_closes() {
    let (_dir, root, mut session) = memory_session();
    let mut seen = Vec::new();
    for round in 0..20 {
        let token = open(&mut session, &root);
        assert!(!seen.contains(&token), "token {token} reissued");
        if round % 3 == 0 {
            session.invoke("close", &[token.as_str()]).expect("close");
        }
        seen.push(token);
    }
    assert_eq!(seen.first().map(String::as_str), Some("::augeas::1"));
    assert_eq!(seen.last().map(String::as_str), Some("::augeas::20"));
}

#[test]
fn closed_tokens_never_resolve_again() {
    let (_dir, root, mut session) = memory_session();
    let token = open(&mut session, &root);
    session.invoke("close", &[token.as_str()]).expect("close");
    let fresh = open(&mut session, &root);
    assert_ne!(fresh, token);

    for (name, args) in [
        ("close", vec![token.as_str()]),
        ("save", vec![token.as_str()]),
        ("get", vec![token.as_str(), "/a"]),
        ("match", vec![token.as_str(), "/*"]),
    ] {
        let err = session.invoke(name, &args).expect_err("closed token");
        assert_eq!(err.kind(), ErrorKind::Token, "{name}");
        assert_eq!(err.message(), Some("unknown token"));
    }
    assert_eq!(session.handles(), vec![fresh]);
}

#[test]
fn zero_matches_succeed_for_match_but_fail_for_rm_and_rename() {
    let (_dir, root, mut session) = memory_session();
    let token = open(&mut session, &root);
    let t = token.as_str();

    assert_eq!(
        session.invoke("match", &[t, "/files/missing"]).expect("match"),
        Outcome::Paths(Vec::new())
    );
    assert_eq!(
        kind_of(session.invoke("rm", &[t, "/files/missing"])),
        ErrorKind::Engine(EngineFault::NoMatch)
    );
    assert_eq!(
        kind_of(session.invoke("rename", &[t, "/files/missing", "other"])),
        ErrorKind::Engine(EngineFault::NoMatch)
    );
    assert_eq!(
        kind_of(session.invoke("match", &[t, "files"])),
        ErrorKind::Engine(EngineFault::InvalidPath)
    );
}

#[test]
fn get_distinguishes_one_none_and_many() {
    let (_dir, root, mut session) = memory_session();
    let token = open(&mut session, &root);
    let t = token.as_str();
    session.invoke("set", &[t, "/hosts/host", "alpha"]).expect("set");
    session
        .invoke("insert", &[t, "/hosts/host", "host"])
        .expect("insert");

    assert_eq!(
        session.invoke("get", &[t, "/hosts/host[1]"]).expect("get"),
        Outcome::Value(Some("alpha".to_string()))
    );
    assert_eq!(
        session.invoke("get", &[t, "/hosts/host[2]"]).expect("get"),
        Outcome::Value(None)
    );
    let none = session.invoke("get", &[t, "/hosts/nothing"]).expect_err("none");
    let many = session.invoke("get", &[t, "/hosts/host"]).expect_err("many");
    assert_eq!(none.kind(), ErrorKind::Engine(EngineFault::NoMatch));
    assert_eq!(many.kind(), ErrorKind::Engine(EngineFault::Ambiguous));
    assert_ne!(none.kind_label(), many.kind_label());
}

#[test]
fn set_then_get_round_trips() {
    let (_dir, root, mut session) = memory_session();
    let token = open(&mut session, &root);
    let t = token.as_str();
    for (path, value) in [
        ("/etc/hosts/1/ipaddr", "127.0.0.1"),
        ("/etc/hosts/1/canonical", "localhost"),
        ("/etc/motd", ""),
    ] {
        session.invoke("set", &[t, path, value]).expect("set");
        assert_eq!(
            session.invoke("get", &[t, path]).expect("get"),
            Outcome::Value(Some(value.to_string()))
        );
    }
}

#[test]
fn insert_defaults_to_after() {
    let (_dir, root, mut session) = memory_session();
    let token = open(&mut session, &root);
    let t = token.as_str();
    session.invoke("set", &[t, "/list/first", "1"]).expect("set");
    session.invoke("set", &[t, "/list/last", "3"]).expect("set");

    session
        .invoke("insert", &[t, "/list/first", "middle"])
        .expect("insert after");
    session
        .invoke("insert", &[t, "/list/first", "head", "before"])
        .expect("insert before");

    assert_eq!(
        session.invoke("match", &[t, "/list/*"]).expect("match"),
        Outcome::Paths(vec![
            "/list/head".to_string(),
            "/list/first".to_string(),
            "/list/middle".to_string(),
            "/list/last".to_string(),
        ])
    );
}

#[test]
fn setm_counts_and_rm_counts_descendants() {
    let (_dir, root, mut session) = memory_session();
    let token = open(&mut session, &root);
    let t = token.as_str();
    session.invoke("set", &[t, "/hosts/a/ip", "1"]).expect("set");
    session.invoke("set", &[t, "/hosts/b/ip", "2"]).expect("set");

    assert_eq!(
        session.invoke("setm", &[t, "/hosts/*", "alias", "x"]).expect("setm"),
        Outcome::Count(2)
    );
    assert_eq!(
        kind_of(session.invoke("setm", &[t, "/nowhere/*", "alias", "x"])),
        ErrorKind::Engine(EngineFault::NoMatch)
    );
    assert_eq!(
        session.invoke("rm", &[t, "/hosts/a"]).expect("rm"),
        Outcome::Count(3)
    );
    assert_eq!(
        session.invoke("rename", &[t, "/hosts/b", "c"]).expect("rename"),
        Outcome::Count(1)
    );
    assert_eq!(
        session.invoke("get", &[t, "/hosts/c/alias"]).expect("get"),
        Outcome::Value(Some("x".to_string()))
    );
}

#[test]
fn mv_and_span_failures_are_engine_errors() {
    let (_dir, root, mut session) = memory_session();
    let token = open(&mut session, &root);
    let t = token.as_str();
    session.invoke("set", &[t, "/a/b", "v"]).expect("set");

    assert_eq!(
        kind_of(session.invoke("mv", &[t, "/a", "/a/b/c"])),
        ErrorKind::Engine(EngineFault::MoveFailed)
    );
    assert_eq!(session.invoke("mv", &[t, "/a", "/z"]).expect("mv"), Outcome::Done);
    assert_eq!(
        session.invoke("get", &[t, "/z/b"]).expect("get"),
        Outcome::Value(Some("v".to_string()))
    );
    assert_eq!(
        kind_of(session.invoke("span", &[t, "/z/b"])),
        ErrorKind::Engine(EngineFault::NoSpan)
    );
}

#[test]
fn mv_onto_an_ancestor_fails_and_keeps_every_node() {
    let (_dir, root, mut session) = memory_session();
    let token = open(&mut session, &root);
    let t = token.as_str();
    session.invoke("set", &[t, "/a/b", "v"]).expect("set");
    let err = session.invoke("mv", &[t, "/a/b", "/a"]).expect_err("ancestor");
    assert_eq!(err.kind(), ErrorKind::Engine(EngineFault::MoveFailed));
    assert!(err.detail().expect("detail").contains("ancestor"));

    session.invoke("set", &[t, "/a/x", "1"]).expect("set");
    session.invoke("set", &[t, "/a/b/c", "2"]).expect("set");
    session.invoke("set", &[t, "/a/b/d", "3"]).expect("set");
    assert_eq!(
        kind_of(session.invoke("mv", &[t, "/a/b", "/a"])),
        ErrorKind::Engine(EngineFault::MoveFailed)
    );
    assert_eq!(
        session.invoke("match", &[t, "/a/b/*"]).expect("match"),
        Outcome::Paths(vec!["/a/b/c".to_string(), "/a/b/d".to_string()])
    );
    assert_eq!(session.handles(), vec![token.clone()]);
}

#[test]
fn malformed_paths_carry_the_engine_diagnostic() {
    let (_dir, root, mut session) = memory_session();
    let token = open(&mut session, &root);
    let t = token.as_str();
    for (name, args, diagnostic) in [
        ("get", vec![t, "relative"], "path must be absolute"),
        ("set", vec![t, "/a[0]", "v"], "unsupported predicate"),
    ] {
        let err = session.invoke(name, &args).expect_err("malformed");
        assert_eq!(err.kind(), ErrorKind::Engine(EngineFault::Ambiguous), "{name}");
        assert!(
            err.detail().is_some_and(|detail| detail.contains(diagnostic)),
            "{name}: {:?}",
            err.detail()
        );
    }
}

#[test]
fn save_and_load_persist_through_the_root() {
    let (_dir, root, mut session) = memory_session();
    let first = open(&mut session, &root);
    session
        .invoke("set", &[first.as_str(), "/app/port", "8080"])
        .expect("set");
    session.invoke("save", &[first.as_str()]).expect("save");

    let second = open(&mut session, &root);
    assert_eq!(
        session.invoke("get", &[second.as_str(), "/app/port"]).expect("get"),
        Outcome::Value(Some("8080".to_string()))
    );

    let flags = InitFlags::NO_LOAD.bits().to_string();
    let blank = session
        .invoke("init", &[root.as_str(), "", flags.as_str()])
        .expect("init")
        .token()
        .expect("token")
        .to_string();
    assert_eq!(
        kind_of(session.invoke("get", &[blank.as_str(), "/app/port"])),
        ErrorKind::Engine(EngineFault::NoMatch)
    );
    session.invoke("load", &[blank.as_str()]).expect("load");
    assert_eq!(
        session.invoke("get", &[blank.as_str(), "/app/port"]).expect("get"),
        Outcome::Value(Some("8080".to_string()))
    );
}

#[test]
fn failed_init_issues_no_token() {
    let (dir, _root, mut session) = memory_session();
    let missing = dir.path().join("absent").to_string_lossy().into_owned();
    let err = session.invoke("init", &[missing.as_str()]).expect_err("missing root");
    assert_eq!(err.kind(), ErrorKind::Construction);
    assert!(session.handles().is_empty());

    let err = session
        .invoke("init", &[missing.as_str(), "", "flags"])
        .expect_err("bad flags");
    assert_eq!(err.kind(), ErrorKind::Conversion);
}

#[test]
fn decode_rejects_bad_token_bodies() {
    let (_dir, _root, mut session) = memory_session();
    for raw in ["::augeas::0", "::augeas::-1", "::augeas::", "abc", "", "::other::1", "1.5"] {
        let err = session.invoke("get", &[raw, "/a"]).expect_err(raw);
        assert_eq!(err.kind(), ErrorKind::Token, "{raw:?}");
    }
}

#[test]
fn bare_numeric_tokens_are_accepted() {
    let (_dir, root, mut session) = memory_session();
    let token = open(&mut session, &root);
    session.invoke("set", &[token.as_str(), "/a", "1"]).expect("set");
    assert_eq!(
        session.invoke("get", &["1", "/a"]).expect("get"),
        Outcome::Value(Some("1".to_string()))
    );
}

type CloseLog = Rc<RefCell<BTreeMap<u32, usize>>>;

struct CountingEngine {
    next_id: u32,
    closes: CloseLog,
}

struct CountingSession {
    id: u32,
    closes: CloseLog,
}

impl Engine for CountingEngine {
    type Session = CountingSession;

    fn init(&mut self, _root: &str, _loadpath: Option<&str>, _flags: InitFlags) -> Option<CountingSession> {
        self.next_id += 1;
        Some(CountingSession {
            id: self.next_id,
            closes: Rc::clone(&self.closes),
        })
    }
}

impl Session for CountingSession {
    fn close(self) {
        *self.closes.borrow_mut().entry(self.id).or_default() += 1;
    }
    fn save(&mut self) -> i32 {
        0
    }
    fn load(&mut self) -> i32 {
        0
    }
    fn get(&self, _path: &str) -> (i32, Option<String>) {
        (0, None)
    }
    fn set(&mut self, _path: &str, _value: Option<&str>) -> i32 {
        0
    }
    fn setm(&mut self, _base: &str, _sub: Option<&str>, _value: &str) -> i32 {
        0
    }
    fn insert(&mut self, _path: &str, _label: &str, _before: bool) -> i32 {
        0
    }
    fn mv(&mut self, _src: &str, _dst: &str) -> i32 {
        0
    }
    fn rm(&mut self, _path: &str) -> i32 {
        0
    }
    fn rename(&mut self, _src: &str, _label: &str) -> i32 {
        0
    }
    fn matches(&self, _path: &str) -> (i32, Vec<String>) {
        (0, Vec::new())
    }
    fn span(&self, _path: &str) -> (i32, Option<RawSpan>) {
        (-1, None)
    }
}

fn counting_session(closes: &CloseLog) -> HostSession<CountingEngine> {
    let engine = CountingEngine {
        next_id: 0,
        closes: Rc::clone(closes),
    };
    HostSession::new(engine, SessionConfig::default()).expect("session")
}

#[test_log::test]
fn teardown_closes_each_remaining_handle_exactly_once() {
    let closes = CloseLog::default();
    let mut session = counting_session(&closes);
    for _ in 0..3 {
        session.invoke("init", &["/"]).expect("init");
    }
    session.invoke("close", &["::augeas::2"]).expect("close");
    assert_eq!(session.shutdown(), 2);
    assert_eq!(
        *closes.borrow(),
        BTreeMap::from([(1, 1), (2, 1), (3, 1)])
    );
}

#[test]
fn dropping_the_session_tears_down_once() {
    let closes = CloseLog::default();
    {
        let mut session = counting_session(&closes);
        session.invoke("init", &["/"]).expect("init");
        session.invoke("init", &["/"]).expect("init");
    }
    assert_eq!(*closes.borrow(), BTreeMap::from([(1, 1), (2, 1)]));

    let empty = counting_session(&closes);
    assert_eq!(empty.shutdown(), 0);
    assert_eq!(closes.borrow().len(), 2);
}
