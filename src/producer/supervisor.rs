//! Producer Supervisor
//!
//! Single responsibility: keep a producer session open and fed, reopening
//! it whenever it fails.
//!
//! # States
//!
//! ```text
//!   Idle ──▶ Resolving ──▶ Connecting ──▶ Producing ──▶ Closing
//!    ▲           │              │                          │
//!    │           │ LookupFailed │ ConnectionFailed         │ SessionClosed
//!    └───────────┴──────────────┴──── wait retry_delay ◀───┘
//! ```
//!
//! Every iteration resolves brokers from scratch. Configuration errors stop
//! the supervisor; everything else is reported as a [`LifecycleEvent`],
//! logged, and retried after `retry_delay`.
//!
//! The supervisor stops when the shutdown token is cancelled or when every
//! sender of the input queue is gone. Messages still queued while no
//! session is open stay buffered and are sent once a session opens.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::session::{Connector, DeliveryErrors, ProducerSession, SendOutcome};
use crate::config::{ProducerConfig, SupervisorConfig};
use crate::error::{DeliveryError, Result};
use crate::message::{LifecycleEvent, Message};
use crate::resolver::ResolveBrokers;

/// Wait before offering a held message to a full producer queue again
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(100);

/// How one supervisor iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Iteration {
    Retry,
    Stop,
}

/// Why the producing loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProduceExit {
    Shutdown,
    InputClosed,
    Unhealthy,
}

/// Drives resolve → connect → produce → close → retry.
pub struct ProducerSupervisor<R, C> {
    resolver: R,
    connector: C,
    producer_config: ProducerConfig,
    config: SupervisorConfig,
    stats: mpsc::Sender<LifecycleEvent>,
}

impl<R, C> ProducerSupervisor<R, C>
where
    R: ResolveBrokers,
    C: Connector,
{
    pub fn new(
        resolver: R,
        connector: C,
        producer_config: ProducerConfig,
        config: SupervisorConfig,
        stats: mpsc::Sender<LifecycleEvent>,
    ) -> Self {
        Self {
            resolver,
            connector,
            producer_config,
            config,
            stats,
        }
    }

    /// Run until shutdown or until the input queue is closed.
    ///
    /// # Errors
    /// Only configuration errors are returned; the caller is expected to
    /// terminate the process.
    pub async fn run(
        self,
        mut messages: mpsc::Receiver<Message>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!(
            retry_delay_ms = self.config.retry_delay.as_millis() as u64,
            failure_threshold = ?self.config.failure_threshold,
            "Kafka producer supervisor started"
        );

        let mut held = None;
        loop {
            if self.iterate(&mut messages, &mut held, &shutdown).await? == Iteration::Stop {
                report_dropped(held.take());
                info!("Kafka producer supervisor stopped");
                return Ok(());
            }

            info!(
                delay_ms = self.config.retry_delay.as_millis() as u64,
                "Waiting before reconnecting to Kafka"
            );
            tokio::select! {
                _ = shutdown.cancelled() => {
                    report_dropped(held.take());
                    info!("Kafka producer supervisor stopped during retry wait");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.retry_delay) => {}
            }
        }
    }

    /// One pass through resolve, connect, produce and close.
    async fn iterate(
        &self,
        messages: &mut mpsc::Receiver<Message>,
        held: &mut Option<Message>,
        shutdown: &CancellationToken,
    ) -> Result<Iteration> {
        let resolved = tokio::select! {
            _ = shutdown.cancelled() => return Ok(Iteration::Stop),
            resolved = self.resolver.resolve() => resolved,
        };

        let brokers = match resolved {
            Ok(brokers) => brokers,
            Err(e) if !e.is_retryable() => {
                error!(error = %e, "Broker resolution failed permanently");
                return Err(e);
            }
            Err(e) => {
                warn!(error = %e, "Broker resolution failed");
                match e.framework() {
                    Some(framework) => {
                        self.emit(LifecycleEvent::LookupFailed(framework.to_string()))
                            .await
                    }
                    None => self.emit(LifecycleEvent::ConnectionFailed).await,
                }
                return Ok(Iteration::Retry);
            }
        };
        info!(brokers = %brokers, "Kafka brokers resolved");

        let opened = tokio::select! {
            _ = shutdown.cancelled() => return Ok(Iteration::Stop),
            opened = self.connector.open(&brokers, &self.producer_config) => opened,
        };

        let session = match opened {
            Ok(session) => session,
            Err(e) if !e.is_retryable() => {
                error!(error = %e, "Failed to open Kafka producer");
                return Err(e);
            }
            Err(e) => {
                self.emit(LifecycleEvent::ConnectionFailed).await;
                warn!(error = %e, "Failed to open Kafka producer");
                return Ok(Iteration::Retry);
            }
        };

        self.emit(LifecycleEvent::SessionOpened).await;
        let mut active = ActiveSession::start(session, self.config.failure_threshold);

        let exit = self.produce(&mut active, messages, held, shutdown).await;
        debug!(?exit, "Producing loop ended");
        self.close_session(&mut active).await;

        Ok(match exit {
            ProduceExit::Unhealthy => Iteration::Retry,
            ProduceExit::Shutdown | ProduceExit::InputClosed => Iteration::Stop,
        })
    }

    /// Forward messages into the session until something ends the session.
    ///
    /// A record refused because the client's queue is full is held in
    /// `held` and retried; no further input is read until it is accepted, so
    /// the bounded input queue pushes back on its producers. A held record
    /// outlives the session and is the first one offered to the next.
    async fn produce<S: ProducerSession>(
        &self,
        active: &mut ActiveSession<S>,
        messages: &mut mpsc::Receiver<Message>,
        held: &mut Option<Message>,
        shutdown: &CancellationToken,
    ) -> ProduceExit {
        let unhealthy = active.unhealthy.clone();
        if let Some(message) = held.take() {
            *held = self.forward(active, message).await;
        }

        loop {
            if held.is_some() {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return ProduceExit::Shutdown,
                    _ = unhealthy.cancelled() => return ProduceExit::Unhealthy,
                    _ = tokio::time::sleep(QUEUE_FULL_BACKOFF) => {}
                }
                if let Some(message) = held.take() {
                    *held = self.forward(active, message).await;
                }
                continue;
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return ProduceExit::Shutdown,
                _ = unhealthy.cancelled() => return ProduceExit::Unhealthy,
                next = messages.recv() => match next {
                    Some(message) => *held = self.forward(active, message).await,
                    None => {
                        info!("Input queue closed");
                        return ProduceExit::InputClosed;
                    }
                },
            }
        }
    }

    /// Hand one message to the session. Returns it if it has to be retried.
    async fn forward<S: ProducerSession>(
        &self,
        active: &mut ActiveSession<S>,
        message: Message,
    ) -> Option<Message> {
        let topic = message.topic.clone();
        match active.send(message) {
            SendOutcome::Accepted => {
                self.emit(LifecycleEvent::MessageSent(topic)).await;
                None
            }
            SendOutcome::QueueFull(message) => {
                debug!(topic = %topic, "Producer queue full, holding message");
                Some(message)
            }
            SendOutcome::Rejected => None,
        }
    }

    /// Report the close and release the session. No-op if already closed.
    async fn close_session<S: ProducerSession>(&self, active: &mut ActiveSession<S>) {
        if active.is_closed() {
            return;
        }
        self.emit(LifecycleEvent::SessionClosed).await;
        active.close().await;
    }

    async fn emit(&self, event: LifecycleEvent) {
        if self.stats.send(event).await.is_err() {
            debug!("Stats receiver dropped, lifecycle event discarded");
        }
    }
}

fn report_dropped(held: Option<Message>) {
    if let Some(message) = held {
        warn!(topic = %message.topic, "Dropping message held back by a full producer queue");
    }
}

/// A session plus the error drain scoped to it.
struct ActiveSession<S> {
    session: S,
    /// Cancelled when the session closes; stops the drain
    drain_stop: CancellationToken,
    /// Cancelled by the drain when the failure threshold is reached
    unhealthy: CancellationToken,
    drain: Option<JoinHandle<u64>>,
    /// Delivery errors reported by the drain, known once closed
    delivery_errors: u64,
    closed: bool,
}

impl<S: ProducerSession> ActiveSession<S> {
    fn start(mut session: S, failure_threshold: Option<u32>) -> Self {
        let drain_stop = CancellationToken::new();
        let unhealthy = CancellationToken::new();

        let drain = session.take_errors().map(|errors| {
            tokio::spawn(drain_errors(
                errors,
                failure_threshold,
                drain_stop.clone(),
                unhealthy.clone(),
            ))
        });

        Self {
            session,
            drain_stop,
            unhealthy,
            drain,
            delivery_errors: 0,
            closed: false,
        }
    }

    fn send(&mut self, message: Message) -> SendOutcome {
        self.session.send(message)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.session.close().await {
            warn!(error = %e, "Failed to shut down producer cleanly");
        }

        self.drain_stop.cancel();
        if let Some(drain) = self.drain.take() {
            match drain.await {
                Ok(seen) => self.delivery_errors = seen,
                Err(e) => warn!(error = %e, "Delivery error drain ended abnormally"),
            }
        }
    }
}

/// Log delivery errors for one session and apply the failure policy.
///
/// Once `stop` fires, errors already queued (typically from the final
/// flush) are still reported before the drain exits. Returns the number of
/// errors seen.
async fn drain_errors(
    mut errors: DeliveryErrors,
    failure_threshold: Option<u32>,
    stop: CancellationToken,
    unhealthy: CancellationToken,
) -> u64 {
    let mut seen = 0u64;
    loop {
        let err = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            next = errors.recv() => match next {
                Some(err) => err,
                None => break,
            },
        };
        report_delivery_error(&err, failure_threshold, &unhealthy);
        seen += 1;
    }

    while let Some(err) = errors.try_recv() {
        report_delivery_error(&err, failure_threshold, &unhealthy);
        seen += 1;
    }

    debug!(delivery_errors = seen, "Delivery error drain stopped");
    seen
}

fn report_delivery_error(
    err: &DeliveryError,
    failure_threshold: Option<u32>,
    unhealthy: &CancellationToken,
) {
    warn!(
        topic = %err.topic,
        error = %err.reason,
        consecutive = err.consecutive_failures,
        "Failed to write message to Kafka"
    );

    if let Some(limit) = failure_threshold {
        if err.consecutive_failures >= limit && !unhealthy.is_cancelled() {
            error!(
                consecutive = err.consecutive_failures,
                limit, "Delivery failure threshold reached, reopening session"
            );
            unhealthy.cancel();
        }
    }
}
