use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use auth_cell::{require_role, IdentityProvider};
use queue_sync_cell::{
    ChannelId, ConnectionState, CounterState, LiveCounterSubscription, QueueContext,
    QueueViewModel, ViewChange,
};
use shared_models::{AppError, Role, Session};

use crate::error::DoctorQueueError;
use crate::models::{DoctorQueueSnapshot, Schedule, WaitingEntry};
use crate::services::completion::CompletionAction;
use crate::services::schedule::ScheduleService;
use crate::services::waiting_list::{reconcile_counter, WaitingListService};

/// A mounted doctor queue screen.
///
/// The doctor's own channel is opened once a schedule is selected. Every
/// counter event is followed by a waiting-list fetch for that schedule.
pub struct DoctorQueueView {
    doctor_id: i64,
    identity: Arc<IdentityProvider>,
    session: Session,
    schedules: Vec<Schedule>,
    selected: Option<i64>,
    model: QueueViewModel,
    waiting: Vec<WaitingEntry>,
    waiting_list: WaitingListService,
    completion: CompletionAction,
    subscription: LiveCounterSubscription,
    counters: mpsc::UnboundedReceiver<CounterState>,
    connection: watch::Receiver<ConnectionState>,
    identity_rx: watch::Receiver<Option<Session>>,
    notice: Option<String>,
    refresh_pending: bool,
    mounted: bool,
}

impl DoctorQueueView {
    #[instrument(skip(ctx, identity))]
    pub async fn mount(
        ctx: &QueueContext,
        identity: Arc<IdentityProvider>,
        doctor_id: i64,
    ) -> Result<Self, AppError> {
        let session = require_role(&identity, Role::Doctor)?;
        if let Some(own) = session.identity.doctor_id {
            if own != doctor_id {
                warn!("Doctor {} is opening the queue of doctor {}", own, doctor_id);
            }
        }

        let schedule_service = ScheduleService::new(ctx.client.clone());
        let schedules = schedule_service
            .list_schedules(doctor_id, &session.token)
            .await
            .map_err(|e| match e {
                DoctorQueueError::Api(api) if api.is_auth() => {
                    AppError::auth_required(Role::Doctor.sign_in_route())
                }
                other => other.into(),
            })?;

        let subscription = ctx.subscription();
        let (tx, counters) = mpsc::unbounded_channel();
        subscription.on_update(move |counter| {
            let _ = tx.send(counter);
        });
        let connection = subscription.watch_connection();

        let mut identity_rx = identity.subscribe();
        identity_rx.borrow_and_update();

        info!("Doctor view mounted for doctor {} with {} schedules", doctor_id, schedules.len());

        Ok(Self {
            doctor_id,
            identity,
            session,
            schedules,
            selected: None,
            model: QueueViewModel::new(None),
            waiting: Vec::new(),
            waiting_list: WaitingListService::new(ctx.client.clone()),
            completion: CompletionAction::new(ctx.client.clone(), ctx.config.completion_pending_timeout),
            subscription,
            counters,
            connection,
            identity_rx,
            notice: None,
            refresh_pending: false,
            mounted: true,
        })
    }

    fn token(&self) -> String {
        self.identity.token().unwrap_or_else(|| self.session.token.clone())
    }

    fn channel(&self) -> ChannelId {
        ChannelId(self.doctor_id)
    }

    /// Start following `schedule_id`. The channel stays open when only the
    /// schedule changes, since every schedule of a doctor shares it.
    #[instrument(skip(self), fields(doctor_id = self.doctor_id))]
    pub async fn select_schedule(&mut self, schedule_id: i64) -> Result<DoctorQueueSnapshot, AppError> {
        if !self.schedules.iter().any(|schedule| schedule.schedule_id == schedule_id) {
            return Err(DoctorQueueError::UnknownSchedule(schedule_id).into());
        }

        if self.selected != Some(schedule_id) {
            info!("Selected schedule {}", schedule_id);
            // the counter and any pending completion belong to the old schedule
            self.model = QueueViewModel::new(None);
            self.model.apply_connection(*self.connection.borrow());
            self.completion.reset();
            self.waiting.clear();
        }
        self.selected = Some(schedule_id);
        self.subscription.open(self.channel()).await;
        self.refresh_pending = true;
        self.refresh_waiting().await;

        Ok(self.snapshot())
    }

    /// Second step of a counter update. `refresh_pending` stays set until the
    /// fetch has finished, so a caller dropping the future mid-fetch gets the
    /// refresh redone on its next `next_change`.
    async fn refresh_waiting(&mut self) {
        let Some(schedule_id) = self.selected else {
            self.refresh_pending = false;
            return;
        };

        let token = self.token();
        let fetched = self.waiting_list.fetch_waiting(schedule_id, &token).await;
        self.refresh_pending = false;
        match fetched {
            Ok(waiting) => {
                if let Some(counter) = reconcile_counter(self.model.counter(), &waiting) {
                    self.model.apply_counter(counter);
                }
                self.waiting = waiting;
            }
            Err(e) => {
                warn!("Waiting list refresh for schedule {} failed: {}", schedule_id, e);
                self.notice = Some(format!("Could not refresh the waiting list: {}", e));
            }
        }
    }

    /// Ask the backend to move on to the next patient. Failures are kept as
    /// a dismissible notice as well as returned.
    pub async fn complete(&mut self) -> Result<(), AppError> {
        let result = match self.selected {
            Some(schedule_id) => {
                let token = self.token();
                self.completion
                    .complete(self.channel(), schedule_id, self.model.counter(), &token)
                    .await
            }
            None => Err(DoctorQueueError::NoScheduleSelected),
        };

        result.map_err(|e| {
            let err = AppError::from(e);
            self.notice = Some(err.to_string());
            err
        })
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn snapshot(&self) -> DoctorQueueSnapshot {
        let counter = self.model.counter();
        let current_patient = counter
            .and_then(CounterState::position)
            .and_then(|position| self.waiting.iter().find(|entry| entry.queue_number == position))
            .cloned();

        DoctorQueueSnapshot {
            doctor_id: self.doctor_id,
            schedules: self.schedules.clone(),
            selected_schedule: self.selected,
            counter,
            current_patient,
            waiting: self.waiting.clone(),
            connection: self.model.connection(),
            stale: self.model.is_stale(),
            can_complete: self.selected.is_some() && self.completion.is_available(counter),
            completion_pending: self.completion.is_pending(),
            notice: self.notice.clone(),
        }
    }

    /// Wait for the next change worth re-rendering. Returns `None` once the
    /// view is unmounted. Safe to use as a `tokio::select!` branch.
    pub async fn next_change(&mut self) -> Option<ViewChange<DoctorQueueSnapshot>> {
        if self.mounted && self.refresh_pending {
            debug!("Finishing an interrupted waiting-list refresh");
            self.refresh_waiting().await;
            return Some(ViewChange::Updated(self.snapshot()));
        }

        while self.mounted {
            tokio::select! {
                Some(counter) = self.counters.recv() => {
                    self.model.apply_counter(counter);
                    self.completion.acknowledge();
                    self.refresh_pending = true;
                    self.refresh_waiting().await;
                    return Some(ViewChange::Updated(self.snapshot()));
                }
                Ok(()) = self.connection.changed() => {
                    let state = *self.connection.borrow_and_update();
                    if self.model.apply_connection(state) {
                        return Some(ViewChange::Updated(self.snapshot()));
                    }
                }
                Ok(()) = self.identity_rx.changed() => {
                    let still_doctor = self
                        .identity_rx
                        .borrow_and_update()
                        .as_ref()
                        .is_some_and(|session| session.role() == Role::Doctor);
                    if !still_doctor {
                        info!("Doctor signed out, leaving queue view");
                        self.unmount().await;
                        return Some(ViewChange::SignedOut {
                            sign_in_route: Role::Doctor.sign_in_route().to_string(),
                        });
                    }
                }
                else => break,
            }
        }
        None
    }

    pub async fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.subscription.close().await;
        info!("Doctor view unmounted for doctor {}", self.doctor_id);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }
}
