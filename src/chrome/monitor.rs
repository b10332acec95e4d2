//! Authentication-completion monitoring
//!
//! Watches one browser tab through the DevTools session and infers when an
//! interactive login has finished. The identity-provider redirect chain is
//! opaque from outside the browser, so completion is inferred from
//! network-visible effects: a navigation into the authentication domain,
//! then quiescence, then a navigation back to the original host.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::chrome::cdp::{CdpClient, CdpEvent};
use crate::chrome::ChromeSupervisor;
use crate::error::{CookieFerryError, Result};
use crate::utils::UrlUtils;

/// How often the poller re-derives the tab's current URL.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Idle window after the last observed event before the login counts as
/// settled, long enough for a final redirect to land.
pub const QUIET_PERIOD: Duration = Duration::from_millis(600);

/// Upper bound on the whole watch; a login the user never finishes must
/// not hang the host forever.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(600);

/// Page lifecycle signals the heuristic distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEventKind {
    FrameNavigated,
    DocumentOpened,
    FrameStoppedLoading,
    Other,
}

impl PageEventKind {
    /// Classify a protocol method name; non-page events return `None`.
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "Page.frameNavigated" => Some(Self::FrameNavigated),
            "Page.documentOpened" => Some(Self::DocumentOpened),
            "Page.frameStoppedLoading" => Some(Self::FrameStoppedLoading),
            _ if method.starts_with("Page.") => Some(Self::Other),
            _ => None,
        }
    }

    /// Whether this event kind denotes a finished load.
    pub fn is_final(self) -> bool {
        matches!(self, Self::DocumentOpened | Self::FrameStoppedLoading)
    }
}

/// The most recent lifecycle signal and when it arrived.
#[derive(Debug, Clone, Copy)]
pub struct ObservedEvent {
    pub kind: PageEventKind,
    pub at: Instant,
}

/// Shared view of one watch. Each field has exactly one writer role: the
/// event consumer records events, the authenticated flag and the closed
/// flag; the poller records the candidate target URL.
pub struct MonitorState {
    authenticated: AtomicBool,
    window_open: AtomicBool,
    last_event: Mutex<Option<ObservedEvent>>,
    target_url: Mutex<Option<Url>>,
}

impl MonitorState {
    pub fn new() -> Self {
        Self {
            authenticated: AtomicBool::new(false),
            window_open: AtomicBool::new(true),
            last_event: Mutex::new(None),
            target_url: Mutex::new(None),
        }
    }

    // event-consumer writes

    pub fn record_event(&self, kind: PageEventKind, at: Instant) {
        *lock(&self.last_event) = Some(ObservedEvent { kind, at });
    }

    /// Monotonic: once a navigation into the authentication domain has been
    /// seen, the flag never resets.
    pub fn mark_authenticated(&self) {
        self.authenticated.store(true, Ordering::SeqCst);
    }

    pub fn mark_window_closed(&self) {
        self.window_open.store(false, Ordering::SeqCst);
    }

    // poller writes

    pub fn record_target_url(&self, url: Url) {
        *lock(&self.target_url) = Some(url);
    }

    // readers

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub fn window_open(&self) -> bool {
        self.window_open.load(Ordering::SeqCst)
    }

    pub fn last_event(&self) -> Option<ObservedEvent> {
        *lock(&self.last_event)
    }

    pub fn target_url(&self) -> Option<Url> {
        lock(&self.target_url).clone()
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Point-in-time view handed to a completion policy.
pub struct WatchSnapshot<'a> {
    pub authenticated: bool,
    pub last_event: Option<ObservedEvent>,
    pub current_url: &'a Url,
}

/// Decides when an interactive login has settled. Kept behind a trait so
/// alternate providers or stricter policies can be unit-tested against
/// synthetic event sequences instead of a live browser.
pub trait CompletionPolicy {
    fn is_settled(&self, snapshot: &WatchSnapshot<'_>, now: Instant) -> bool;
}

/// The default heuristic: authentication was observed, the last event
/// finished a load, nothing has happened for the quiet period, and the tab
/// is back on the requested host.
pub struct QuietPeriodPolicy {
    pub quiet_period: Duration,
    pub target_host: String,
}

impl QuietPeriodPolicy {
    pub fn new(target_host: String) -> Self {
        Self {
            quiet_period: QUIET_PERIOD,
            target_host,
        }
    }
}

impl CompletionPolicy for QuietPeriodPolicy {
    fn is_settled(&self, snapshot: &WatchSnapshot<'_>, now: Instant) -> bool {
        let Some(last) = snapshot.last_event else {
            return false;
        };
        snapshot.authenticated
            && now.duration_since(last.at) > self.quiet_period
            && last.kind.is_final()
            && UrlUtils::host_contains(snapshot.current_url, &self.target_host)
    }
}

/// Terminal states of one watch.
#[derive(Debug)]
pub enum MonitorOutcome {
    /// The completion heuristic fired; the tab had settled on this URL.
    Settled { target_url: Url },
    /// The user closed the window first. Not an error; whatever cookies the
    /// store holds decide the rest of the pipeline.
    WindowClosed { last_url: Option<Url> },
}

/// Attach to the supervised browser and block until the login settles, the
/// window closes, or the session timeout expires. The browser is stopped on
/// every exit path.
pub async fn wait_for_authentication(
    supervisor: &mut ChromeSupervisor,
    request_url: &Url,
    auth_domain: &str,
) -> Result<MonitorOutcome> {
    let (client, events) = CdpClient::connect(supervisor.debug_port()).await?;

    let outcome = tokio::time::timeout(
        SESSION_TIMEOUT,
        watch_session(&client, events, request_url, auth_domain),
    )
    .await;

    client.close().await;
    supervisor.stop();

    match outcome {
        Ok(result) => result,
        Err(_) => Err(CookieFerryError::AuthenticationTimeout(
            SESSION_TIMEOUT.as_secs(),
        )),
    }
}

async fn watch_session(
    client: &CdpClient,
    mut events: mpsc::UnboundedReceiver<CdpEvent>,
    request_url: &Url,
    auth_domain: &str,
) -> Result<MonitorOutcome> {
    let request_host = request_url
        .host_str()
        .ok_or_else(|| CookieFerryError::Validation("request URL has no host".to_string()))?
        .to_string();

    // Attaching: exactly one open page must match the requested host.
    let targets = client.get_targets().await?;
    let mut candidates = targets.into_iter().filter(|target| {
        target.kind == "page"
            && Url::parse(&target.url)
                .map(|url| UrlUtils::host_contains(&url, &request_host))
                .unwrap_or(false)
    });
    let target = candidates.next().ok_or_else(|| {
        CookieFerryError::DebuggingConnect(format!("no open page matches host {}", request_host))
    })?;
    if candidates.next().is_some() {
        return Err(CookieFerryError::DebuggingConnect(format!(
            "multiple open pages match host {}",
            request_host
        )));
    }

    client.set_discover_targets().await?;
    let session_id = client.attach_to_target(&target.target_id).await?;
    client.enable_page_events(&session_id).await?;
    log::info!("Watching target {} for login completion", target.target_id);

    let state = MonitorState::new();
    let policy = QuietPeriodPolicy::new(request_host);

    // One owning scope for both listeners: whichever resolves first cancels
    // the other.
    tokio::select! {
        _ = consume_events(&mut events, &state, &target.target_id, auth_domain) => {
            log::info!("Browser window closed before the heuristic fired");
            Ok(MonitorOutcome::WindowClosed { last_url: state.target_url() })
        }
        polled = poll_until_settled(client, &session_id, &state, &policy) => {
            match polled {
                Ok(target_url) => {
                    log::info!("Login settled on {}", target_url);
                    Ok(MonitorOutcome::Settled { target_url })
                }
                Err(e) if !state.window_open() => {
                    // teardown already started, nothing left to fail
                    log::debug!("Ignoring error after the window closed: {}", e);
                    Ok(MonitorOutcome::WindowClosed { last_url: state.target_url() })
                }
                Err(e) => Err(e),
            }
        }
    }
}

/// Event-consumer role: updates the shared state from the protocol event
/// stream. Returns when the watched target is destroyed or the stream ends,
/// both of which mean the window is gone.
async fn consume_events(
    events: &mut mpsc::UnboundedReceiver<CdpEvent>,
    state: &MonitorState,
    watched_target_id: &str,
    auth_domain: &str,
) {
    while let Some(event) = events.recv().await {
        if event.method == "Target.targetDestroyed" {
            let destroyed = event.params.get("targetId").and_then(Value::as_str);
            if destroyed == Some(watched_target_id) {
                state.mark_window_closed();
                return;
            }
            continue;
        }

        let Some(kind) = PageEventKind::from_method(&event.method) else {
            continue;
        };
        if kind == PageEventKind::FrameNavigated {
            // a navigation into the auth domain means the login happened
            let frame_url = event.params.pointer("/frame/url").and_then(Value::as_str);
            if let Some(frame_url) = frame_url {
                let into_auth_domain = Url::parse(frame_url)
                    .map(|url| UrlUtils::host_contains(&url, auth_domain))
                    .unwrap_or(false);
                if into_auth_domain {
                    state.mark_authenticated();
                }
            }
        }
        state.record_event(kind, Instant::now());
    }
    state.mark_window_closed();
}

/// Poller role: re-derives the tab's current URL on a fixed interval and
/// evaluates the completion policy against the shared state.
async fn poll_until_settled(
    client: &CdpClient,
    session_id: &str,
    state: &MonitorState,
    policy: &dyn CompletionPolicy,
) -> Result<Url> {
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        if state.last_event().is_none() {
            continue;
        }

        let current = client.current_history_url(session_id).await?;
        let current = Url::parse(&current).map_err(|e| {
            CookieFerryError::DebuggingConnect(format!(
                "browser reported unparsable URL '{}': {}",
                current, e
            ))
        })?;
        state.record_target_url(current.clone());

        let snapshot = WatchSnapshot {
            authenticated: state.is_authenticated(),
            last_event: state.last_event(),
            current_url: &current,
        };
        if policy.is_settled(&snapshot, Instant::now()) {
            return Ok(current);
        }
    }
}
