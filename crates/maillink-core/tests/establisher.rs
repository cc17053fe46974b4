//! Integration tests for the connection establisher.
//!
//! A scripted provider decides per attempt whether the connect succeeds,
//! and a scripted network stack supplies addresses and interfaces.

#![allow(clippy::unwrap_used)]

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use maillink_core::{
    Account, AddressFamily, AppIdentity, ConnectionEstablisher, ConnectionTarget, Diagnostics,
    Error, Identity, LocalInterface, MailProvider, MailStore, MailTransport, NetworkStack,
    Protocol, Result, ServerEndpoint, Session,
};

const DIRECT: &str = "198.51.100.1:993";

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn direct() -> SocketAddr {
    DIRECT.parse().unwrap()
}

/// What the provider saw for one connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Attempt {
    host: String,
    port: u16,
    user: String,
    local: Option<IpAddr>,
    remote: Option<IpAddr>,
    partial_fetch: Option<bool>,
    local_hostname: Option<String>,
}

type Outcome = Arc<dyn Fn(&Attempt) -> Result<()> + Send + Sync>;

/// Connect-level failure naming the address it was attempted against.
fn refused(attempt: &Attempt) -> Error {
    let address = attempt
        .remote
        .map_or_else(direct, |remote| SocketAddr::new(remote, 993));
    maillink_imap::Error::Connect {
        address,
        source: io::ErrorKind::ConnectionRefused.into(),
    }
    .into()
}

fn connect_address(err: &Error) -> SocketAddr {
    match err {
        Error::Imap(maillink_imap::Error::Connect { address, .. }) => *address,
        other => panic!("not a connect failure: {other}"),
    }
}

#[derive(Clone)]
struct MockProvider {
    attempts: Arc<Mutex<Vec<Attempt>>>,
    outcome: Outcome,
    capabilities: Vec<&'static str>,
    id_reply: Option<Vec<(String, String)>>,
    id_fails: bool,
    close_fails: bool,
    closed: Arc<AtomicUsize>,
}

impl MockProvider {
    fn new(outcome: impl Fn(&Attempt) -> Result<()> + Send + Sync + 'static) -> Self {
        Self {
            attempts: Arc::default(),
            outcome: Arc::new(outcome),
            capabilities: Vec::new(),
            id_reply: None,
            id_fails: false,
            close_fails: false,
            closed: Arc::default(),
        }
    }

    fn always_refused() -> Self {
        Self::new(|attempt| Err(refused(attempt)))
    }

    fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    fn pairs(&self) -> Vec<(Option<IpAddr>, Option<IpAddr>)> {
        self.attempts()
            .into_iter()
            .map(|a| (a.remote, a.local))
            .collect()
    }

    fn record(&self, session: &Session, target: &ConnectionTarget<'_>) -> Result<()> {
        let properties = session.properties();
        let attempt = Attempt {
            host: target.host.to_string(),
            port: target.port,
            user: target.user.to_string(),
            local: properties.transport.local_address,
            remote: properties.transport.remote_address,
            partial_fetch: properties.partial_fetch(),
            local_hostname: properties.local_hostname().map(ToString::to_string),
        };
        self.attempts.lock().unwrap().push(attempt.clone());
        (self.outcome)(&attempt)
    }
}

struct MockStore {
    capabilities: Vec<&'static str>,
    id_reply: Option<Vec<(String, String)>>,
    id_fails: bool,
    close_fails: bool,
    closed: Arc<AtomicUsize>,
}

impl MailStore for MockStore {
    fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    async fn id(&mut self, params: &[(&str, &str)]) -> Result<Option<Vec<(String, String)>>> {
        assert_eq!(params[0].0, "name");
        assert_eq!(params[1].0, "version");
        if self.id_fails {
            return Err(maillink_imap::Error::Bad("ID not allowed".into()).into());
        }
        Ok(self.id_reply.clone())
    }

    async fn close(self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.close_fails {
            return Err(maillink_imap::Error::Io(io::ErrorKind::BrokenPipe.into()).into());
        }
        Ok(())
    }
}

struct MockTransport {
    closed: Arc<AtomicUsize>,
}

impl MailTransport for MockTransport {
    async fn close(self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl MailProvider for MockProvider {
    type Store = MockStore;
    type Transport = MockTransport;

    async fn open_store(&self, session: &Session, target: &ConnectionTarget<'_>) -> Result<MockStore> {
        self.record(session, target)?;
        Ok(MockStore {
            capabilities: self.capabilities.clone(),
            id_reply: self.id_reply.clone(),
            id_fails: self.id_fails,
            close_fails: self.close_fails,
            closed: Arc::clone(&self.closed),
        })
    }

    async fn open_transport(
        &self,
        session: &Session,
        target: &ConnectionTarget<'_>,
    ) -> Result<MockTransport> {
        self.record(session, target)?;
        Ok(MockTransport {
            closed: Arc::clone(&self.closed),
        })
    }
}

#[derive(Clone, Default)]
struct MockNetwork {
    /// `None` makes resolution fail.
    remotes: Option<Vec<IpAddr>>,
    /// `None` makes enumeration fail.
    interfaces: Option<Vec<LocalInterface>>,
    local_v4: Option<IpAddr>,
    local_v6: Option<IpAddr>,
    resolve_calls: Arc<AtomicUsize>,
    interface_calls: Arc<AtomicUsize>,
}

impl MockNetwork {
    fn new(remotes: &[&str], interfaces: Vec<LocalInterface>) -> Self {
        Self {
            remotes: Some(remotes.iter().map(|r| ip(r)).collect()),
            interfaces: Some(interfaces),
            ..Self::default()
        }
    }
}

impl NetworkStack for MockNetwork {
    async fn resolve(&self, _host: &str) -> io::Result<Vec<IpAddr>> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.remotes
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "resolver down"))
    }

    fn interfaces(&self) -> io::Result<Vec<LocalInterface>> {
        self.interface_calls.fetch_add(1, Ordering::SeqCst);
        self.interfaces
            .clone()
            .ok_or_else(|| io::Error::other("no interface list"))
    }

    fn local_address(&self, family: AddressFamily) -> io::Result<IpAddr> {
        match family {
            AddressFamily::V4 => self.local_v4,
            AddressFamily::V6 => self.local_v6,
        }
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no local address"))
    }
}

#[derive(Default)]
struct RecordingDiagnostics {
    lines: Mutex<Vec<String>>,
    breadcrumbs: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl Diagnostics for RecordingDiagnostics {
    fn log(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn breadcrumb(&self, name: &str, data: &[(String, String)]) {
        self.breadcrumbs
            .lock()
            .unwrap()
            .push((name.to_string(), data.to_vec()));
    }
}

fn establisher(
    protocol: &str,
    provider: &MockProvider,
    network: &MockNetwork,
) -> ConnectionEstablisher<MockProvider, MockNetwork> {
    ConnectionEstablisher::new(protocol, false, false)
        .with_provider(provider.clone())
        .with_network(network.clone())
}

fn dual_stack_interfaces() -> Vec<LocalInterface> {
    vec![
        LocalInterface::up("eth0", vec![ip("10.0.0.5")]),
        LocalInterface::up("wlan0", vec![ip("2001:db8:1::5")]),
    ]
}

#[tokio::test]
async fn direct_success_skips_fallback() {
    let provider = MockProvider::new(|_| Ok(()));
    let network = MockNetwork::new(&["192.0.2.10", "2001:db8::10"], dual_stack_interfaces());
    let mut est = establisher("imaps", &provider, &network);

    est.connect("imap.example.com", 993, "me", "secret").await.unwrap();

    assert!(est.is_connected());
    assert_eq!(provider.pairs(), vec![(None, None)]);
    assert_eq!(network.resolve_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn single_address_reraises_without_enumeration() {
    let provider = MockProvider::always_refused();
    let network = MockNetwork::new(&["192.0.2.10"], dual_stack_interfaces());
    let mut est = establisher("imaps", &provider, &network);

    let err = est.connect("imap.example.com", 993, "me", "secret").await.unwrap_err();

    assert_eq!(connect_address(&err), direct());
    assert_eq!(provider.attempts().len(), 1);
    assert_eq!(network.resolve_calls.load(Ordering::SeqCst), 1);
    assert_eq!(network.interface_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dual_stack_tries_matching_pairs_then_reraises_original() {
    let provider = MockProvider::always_refused();
    let network = MockNetwork::new(&["192.0.2.10", "2001:db8::10"], dual_stack_interfaces());
    let mut est = establisher("imaps", &provider, &network);

    let err = est.connect("imap.example.com", 993, "me", "secret").await.unwrap_err();

    assert_eq!(
        provider.pairs(),
        vec![
            (None, None),
            (Some(ip("192.0.2.10")), Some(ip("10.0.0.5"))),
            (Some(ip("2001:db8::10")), Some(ip("2001:db8:1::5"))),
        ]
    );
    assert_eq!(connect_address(&err), direct());
    assert!(!est.is_connected());
    assert_eq!(est.properties().transport.local_address, None);
    assert_eq!(est.properties().transport.remote_address, None);
}

#[tokio::test]
async fn first_bound_success_wins() {
    let provider = MockProvider::new(|attempt| {
        if attempt.local == Some(ip("10.1.0.5")) {
            Ok(())
        } else {
            Err(refused(attempt))
        }
    });
    let network = MockNetwork::new(
        &["192.0.2.10", "192.0.2.11"],
        vec![
            LocalInterface::up("eth0", vec![ip("10.0.0.5")]),
            LocalInterface::up("tun0", vec![ip("10.1.0.5")]),
        ],
    );
    let mut est = establisher("imap", &provider, &network);

    est.connect("imap.example.com", 143, "me", "secret").await.unwrap();

    assert_eq!(
        provider.pairs(),
        vec![
            (None, None),
            (Some(ip("192.0.2.10")), Some(ip("10.0.0.5"))),
            (Some(ip("192.0.2.10")), Some(ip("10.1.0.5"))),
        ]
    );
    let session = est.session().unwrap();
    assert_eq!(session.properties().transport.local_address, Some(ip("10.1.0.5")));
    assert_eq!(session.properties().transport.remote_address, Some(ip("192.0.2.10")));
    assert!(est.store().is_ok());
}

#[tokio::test]
async fn bound_success_does_not_pin_later_connects() {
    let provider = MockProvider::new(|attempt| {
        if attempt.host == "other.example.net" || attempt.local == Some(ip("10.1.0.5")) {
            Ok(())
        } else {
            Err(refused(attempt))
        }
    });
    let network = MockNetwork::new(
        &["192.0.2.10", "192.0.2.11"],
        vec![
            LocalInterface::up("eth0", vec![ip("10.0.0.5")]),
            LocalInterface::up("tun0", vec![ip("10.1.0.5")]),
        ],
    );
    let mut est = establisher("imaps", &provider, &network);

    est.connect("imap.example.com", 993, "me", "secret").await.unwrap();
    assert_eq!(est.properties().transport.local_address, None);
    assert_eq!(est.properties().transport.remote_address, None);

    est.connect("other.example.net", 993, "me", "secret").await.unwrap();

    let second = provider.attempts().pop().unwrap();
    assert_eq!(second.host, "other.example.net");
    assert_eq!(second.remote, None);
    assert_eq!(second.local, None);
    let session = est.session().unwrap();
    assert_eq!(session.properties().transport.remote_address, None);
}

#[tokio::test]
async fn skips_down_and_loopback_interfaces() {
    let provider = MockProvider::always_refused();
    let mut lo = LocalInterface::up("lo", vec![ip("127.0.0.1")]);
    lo.is_loopback = true;
    let mut down = LocalInterface::up("eth1", vec![ip("10.2.0.5")]);
    down.is_up = false;
    let network = MockNetwork::new(
        &["192.0.2.10", "192.0.2.11"],
        vec![lo, down, LocalInterface::up("eth0", vec![ip("10.0.0.5")])],
    );
    let mut est = establisher("smtps", &provider, &network);

    est.connect("smtp.example.com", 465, "me", "secret").await.unwrap_err();

    let locals: Vec<_> = provider.attempts().into_iter().map(|a| a.local).collect();
    assert_eq!(locals, vec![None, Some(ip("10.0.0.5")), Some(ip("10.0.0.5"))]);
}

#[tokio::test]
async fn resolution_failure_reraises_original() {
    let provider = MockProvider::always_refused();
    let network = MockNetwork {
        remotes: None,
        ..MockNetwork::new(&[], dual_stack_interfaces())
    };
    let mut est = establisher("imaps", &provider, &network);

    let err = est.connect("imap.example.com", 993, "me", "secret").await.unwrap_err();

    assert_eq!(connect_address(&err), direct());
    assert_eq!(provider.attempts().len(), 1);
}

#[tokio::test]
async fn enumeration_failure_reraises_original() {
    let provider = MockProvider::always_refused();
    let network = MockNetwork {
        interfaces: None,
        ..MockNetwork::new(&["192.0.2.10", "2001:db8::10"], Vec::new())
    };
    let mut est = establisher("imaps", &provider, &network);

    let err = est.connect("imap.example.com", 993, "me", "secret").await.unwrap_err();

    assert_eq!(connect_address(&err), direct());
    assert_eq!(network.interface_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.attempts().len(), 1);
}

#[tokio::test]
async fn non_connect_failure_propagates_without_fallback() {
    let provider = MockProvider::new(|_| {
        Err(maillink_smtp::Error::Auth {
            code: 535,
            message: "5.7.8 bad credentials".into(),
        }
        .into())
    });
    let network = MockNetwork::new(&["192.0.2.10", "2001:db8::10"], dual_stack_interfaces());
    let mut est = establisher("smtp", &provider, &network);

    let err = est.connect("smtp.example.com", 587, "me", "wrong").await.unwrap_err();

    assert!(matches!(err, Error::Smtp(maillink_smtp::Error::Auth { code: 535, .. })));
    assert_eq!(provider.attempts().len(), 1);
    assert_eq!(network.resolve_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unsupported_protocol_fails_without_fallback() {
    let provider = MockProvider::new(|_| Ok(()));
    let network = MockNetwork::new(&["192.0.2.10", "2001:db8::10"], dual_stack_interfaces());
    let mut est = establisher("pop3", &provider, &network);

    let err = est.connect("pop.example.com", 995, "me", "secret").await.unwrap_err();

    assert!(matches!(err, Error::UnsupportedProvider(ref name) if name == "pop3"));
    assert!(provider.attempts().is_empty());
    assert_eq!(network.resolve_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn partial_fetch_reaches_the_session() {
    let provider = MockProvider::new(|_| Ok(()));
    let network = MockNetwork::default();
    let mut est = establisher("imaps", &provider, &network);

    est.set_partial_fetch(false);
    est.set_separate_store_connection();
    est.connect("imap.example.com", 993, "me", "secret").await.unwrap();

    assert_eq!(provider.attempts()[0].partial_fetch, Some(false));
    let properties = est.session().unwrap().properties();
    assert_eq!(properties.separate_store_connection(), Some(true));
}

#[tokio::test]
async fn store_setters_are_ignored_for_transports() {
    let provider = MockProvider::new(|_| Ok(()));
    let network = MockNetwork::default();
    let mut est = establisher("smtp", &provider, &network);

    est.set_partial_fetch(false);
    est.set_separate_store_connection();

    assert_eq!(est.properties().partial_fetch(), None);
    assert_eq!(est.properties().separate_store_connection(), None);
}

#[tokio::test]
async fn use_ip_announces_address_literal() {
    let provider = MockProvider::new(|_| Ok(()));
    let network = MockNetwork {
        local_v4: Some(ip("192.0.2.55")),
        local_v6: Some(ip("2001:db8::55")),
        ..MockNetwork::new(&["203.0.113.25"], Vec::new())
    };
    let mut est = establisher("smtp", &provider, &network);
    est.set_use_ip(true, "smtp.example.com").await.unwrap();
    assert_eq!(est.properties().local_hostname(), Some("[192.0.2.55]"));

    let network = MockNetwork {
        remotes: Some(vec![ip("2001:db8::25")]),
        ..network
    };
    let mut est = establisher("smtp", &provider, &network);
    est.set_use_ip(true, "smtp.example.com").await.unwrap();
    assert_eq!(est.properties().local_hostname(), Some("[IPv6:2001:db8::55]"));

    est.connect("smtp.example.com", 587, "me", "secret").await.unwrap();
    assert_eq!(
        provider.attempts()[0].local_hostname.as_deref(),
        Some("[IPv6:2001:db8::55]")
    );
}

#[tokio::test]
async fn use_ip_disabled_announces_host_verbatim() {
    let provider = MockProvider::new(|_| Ok(()));
    let network = MockNetwork::default();
    let mut est = establisher("smtps", &provider, &network);

    est.set_use_ip(false, "client.example.org").await.unwrap();

    assert_eq!(est.properties().local_hostname(), Some("client.example.org"));
    assert_eq!(network.resolve_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn use_ip_resolution_failure() {
    let provider = MockProvider::new(|_| Ok(()));
    let network = MockNetwork::default();
    let mut est = establisher("smtp", &provider, &network);

    let err = est.set_use_ip(true, "smtp.example.com").await.unwrap_err();
    assert!(matches!(err, Error::Resolution { ref host, .. } if host == "smtp.example.com"));

    let network = MockNetwork::new(&["192.0.2.25"], Vec::new());
    let mut est = establisher("smtp", &provider, &network);
    let err = est.set_use_ip(true, "smtp.example.com").await.unwrap_err();
    assert!(matches!(err, Error::Resolution { .. }));
    assert_eq!(est.properties().local_hostname(), None);
}

#[tokio::test]
async fn server_identity_is_recorded() {
    let mut provider = MockProvider::new(|_| Ok(()));
    provider.capabilities = vec!["IMAP4rev1", "ID"];
    provider.id_reply = Some(vec![
        ("name".into(), "Dovecot".into()),
        ("version".into(), "2.3".into()),
    ]);
    let network = MockNetwork::default();
    let diagnostics = Arc::new(RecordingDiagnostics::default());
    let mut est = establisher("imaps", &provider, &network)
        .with_diagnostics(diagnostics.clone())
        .with_app_identity(AppIdentity::new("FairMail", "1.2"));

    est.connect("imap.example.com", 993, "me", "secret").await.unwrap();

    assert_eq!(
        est.server_identity().unwrap(),
        &[
            ("name".to_string(), "Dovecot".to_string()),
            ("version".to_string(), "2.3".to_string()),
        ]
    );
    assert_eq!(
        *diagnostics.lines.lock().unwrap(),
        vec!["Server name=Dovecot", "Server version=2.3"]
    );
    let breadcrumbs = diagnostics.breadcrumbs.lock().unwrap();
    assert_eq!(breadcrumbs.len(), 1);
    assert_eq!(breadcrumbs[0].0, "server");
}

#[tokio::test]
async fn identification_failure_is_ignored() {
    let mut provider = MockProvider::new(|_| Ok(()));
    provider.capabilities = vec!["ID"];
    provider.id_fails = true;
    let network = MockNetwork::default();
    let mut est = establisher("imap", &provider, &network);

    est.connect("imap.example.com", 143, "me", "secret").await.unwrap();

    assert!(est.is_connected());
    assert!(est.server_identity().is_none());
}

#[tokio::test]
async fn no_identification_without_capability() {
    let mut provider = MockProvider::new(|_| Ok(()));
    provider.id_reply = Some(vec![("name".into(), "Dovecot".into())]);
    let network = MockNetwork::default();
    let mut est = establisher("imap", &provider, &network);

    est.connect("imap.example.com", 143, "me", "secret").await.unwrap();

    assert!(est.server_identity().is_none());
}

#[tokio::test]
async fn accessors_check_service_kind() {
    let provider = MockProvider::new(|_| Ok(()));
    let network = MockNetwork::default();
    let mut est = establisher("smtp", &provider, &network);

    assert!(matches!(est.transport(), Err(Error::NotConnected)));
    est.connect("smtp.example.com", 587, "me", "secret").await.unwrap();

    assert!(est.transport().is_ok());
    assert!(matches!(
        est.store(),
        Err(Error::WrongServiceKind { requested: "store", .. })
    ));
}

#[tokio::test]
async fn close_clears_state_when_release_fails() {
    let mut provider = MockProvider::new(|_| Ok(()));
    provider.close_fails = true;
    let network = MockNetwork::default();
    let mut est = establisher("imaps", &provider, &network);
    est.set_partial_fetch(false);
    est.connect("imap.example.com", 993, "me", "secret").await.unwrap();

    let err = est.close().await.unwrap_err();

    assert!(matches!(err, Error::Imap(maillink_imap::Error::Io(_))));
    assert_eq!(provider.closed.load(Ordering::SeqCst), 1);
    assert!(!est.is_connected());
    assert!(est.session().is_none());
    assert_eq!(est.properties().partial_fetch(), Some(true));
    assert!(matches!(est.store(), Err(Error::NotConnected)));
    assert!(matches!(
        est.connect("imap.example.com", 993, "me", "secret").await,
        Err(Error::Closed)
    ));

    est.close().await.unwrap();
    assert_eq!(provider.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn close_without_connect() {
    let provider = MockProvider::new(|_| Ok(()));
    let network = MockNetwork::default();
    let mut est = establisher("smtp", &provider, &network);

    est.close().await.unwrap();
    est.close().await.unwrap();
    assert_eq!(provider.closed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reconnect_releases_previous_connection() {
    let provider = MockProvider::new(|_| Ok(()));
    let network = MockNetwork::default();
    let mut est = establisher("smtps", &provider, &network);

    est.connect("smtp.example.com", 465, "me", "secret").await.unwrap();
    est.connect("smtp.example.com", 465, "me", "secret").await.unwrap();

    assert_eq!(provider.closed.load(Ordering::SeqCst), 1);
    assert!(est.is_connected());
}

#[tokio::test]
async fn connect_from_records() {
    let provider = MockProvider::new(|_| Ok(()));
    let network = MockNetwork::default();

    let account = Account {
        name: "Work".into(),
        server: ServerEndpoint {
            host: "imap.example.com".into(),
            port: 993,
            user: "me@example.com".into(),
            password: "secret".into(),
        },
    };
    let mut est = establisher("imaps", &provider, &network);
    est.connect_account(&account).await.unwrap();

    let identity = Identity::from_json(
        r#"{"name":"Me","email":"me@example.com","host":"smtp.example.com","port":587,"user":"me","password":"pw"}"#,
    )
    .unwrap();
    let mut est = establisher("smtp", &provider, &network);
    est.connect_identity(&identity).await.unwrap();

    let attempts = provider.attempts();
    assert_eq!(
        (attempts[0].host.as_str(), attempts[0].port, attempts[0].user.as_str()),
        ("imap.example.com", 993, "me@example.com")
    );
    assert_eq!(
        (attempts[1].host.as_str(), attempts[1].port, attempts[1].user.as_str()),
        ("smtp.example.com", 587, "me")
    );
}

#[tokio::test]
async fn protocol_accessor() {
    let est = ConnectionEstablisher::new(Protocol::Smtps, true, true);
    assert_eq!(est.protocol(), &Protocol::Smtps);
    assert!(est.properties().transport.allow_plaintext);
    assert!(est.properties().transport.debug);
}
