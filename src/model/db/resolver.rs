use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, trace, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::future::{BoxFuture, FutureExt},
    tokio::sync::Mutex,
    Build, Rocket,
};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        db::Meeting,
        mongodb::Id,
        store::Store,
        voting::{resolve_winner, VotingPolicy},
    },
    scheduled_task::ScheduledTask,
};

/// Map from meeting IDs to resolver tasks.
type TaskMap = HashMap<Id, ScheduledTask<Result<()>>>;

/// How long to wait before retrying a resolver that hit a store failure.
const RETRY_INTERVAL_SECONDS: i64 = 300;

/// When a resolver for the given meeting should fire: just after voting closes.
fn due_at(meeting: &Meeting) -> DateTime<Utc> {
    meeting.voting_end_time + Duration::milliseconds(1)
}

/// Meeting resolvers: scheduled tasks declaring each meeting's winner as soon
/// as its voting window closes.
pub struct MeetingResolvers {
    tasks: Arc<Mutex<TaskMap>>,
    store: Store,
    policy: Arc<VotingPolicy>,
}

impl MeetingResolvers {
    /// Create an empty set of resolvers.
    pub fn new(store: Store, policy: VotingPolicy) -> Self {
        Self {
            tasks: Default::default(),
            store,
            policy: Arc::new(policy),
        }
    }

    /// Does the given meeting have a resolver scheduled?
    pub async fn has_resolver(&self, meeting: Id) -> bool {
        self.tasks.lock().await.contains_key(&meeting)
    }

    /// Schedule a resolver for every meeting without a declared winner.
    pub async fn schedule_pending(&self) -> Result<usize> {
        let meetings = self.store.find_unresolved_meetings().await?;
        let count = meetings.len();
        for meeting in &meetings {
            self.schedule_meeting(meeting).await;
        }
        Ok(count)
    }

    /// Schedule a resolver for the given meeting.
    /// If one already exists, it will be rescheduled.
    pub async fn schedule_meeting(&self, meeting: &Meeting) {
        if meeting.winner_declared {
            self.cancel_meeting(meeting.id).await;
            return;
        }
        let resolver = Self::resolver(
            meeting.id,
            self.store.clone(),
            self.policy.clone(),
            self.tasks.clone(),
        );
        let mut tasks_locked = self.tasks.lock().await;
        if let Some(task) = tasks_locked.remove(&meeting.id) {
            if task.cancel().await {
                // A completed resolver removes itself, so this one lost a race with it.
                debug!("Resolver for meeting {} finished before rescheduling", meeting.id);
            }
        }
        tasks_locked.insert(meeting.id, ScheduledTask::new(resolver, due_at(meeting)));
        trace!("Scheduled resolver for meeting {} at {}", meeting.id, due_at(meeting));
    }

    /// Stop tracking the given meeting, e.g. because it was deleted.
    pub async fn cancel_meeting(&self, meeting: Id) {
        let task = self.tasks.lock().await.remove(&meeting);
        if let Some(task) = task {
            task.cancel().await;
            debug!("Cancelled resolver for meeting {meeting}");
        }
    }

    /// Immediately trigger the resolver for the given meeting.
    /// If none was scheduled (or it already completed), this has no effect.
    pub async fn resolve_now(&self, meeting: Id) -> Result<()> {
        let task = self.tasks.lock().await.remove(&meeting);
        // The lock is released here; the resolver needs it too.
        match task {
            Some(resolver) => {
                resolver.trigger_now();
                resolver.await.unwrap_or_else(|e| {
                    Err(Error::StoreUnavailable(format!(
                        "Resolver for meeting {meeting} did not complete: {e}"
                    )))
                })
            }
            None => Ok(()),
        }
    }

    /// Resolve the given meeting, rescheduling itself if it cannot finish yet.
    /// Since this is a recursive async function, we must use `BoxFuture` to
    /// avoid an infinitely-recursive state machine.
    fn resolver(
        meeting_id: Id,
        store: Store,
        policy: Arc<VotingPolicy>,
        tasks: Arc<Mutex<TaskMap>>,
    ) -> BoxFuture<'static, Result<()>> {
        /// What to do once a resolution attempt is over.
        enum Next {
            Done,
            RunAt(DateTime<Utc>),
        }

        async fn resolve(meeting_id: Id, store: &Store, policy: &VotingPolicy) -> Result<Next> {
            debug!("Running resolver for meeting {meeting_id}");
            let meeting = match store.find_meeting(meeting_id).await? {
                Some(meeting) => meeting,
                None => {
                    debug!("Meeting {meeting_id} is gone, nothing to resolve");
                    return Ok(Next::Done);
                }
            };
            match resolve_winner(store.as_ref(), &meeting, Utc::now(), policy).await {
                // Empty meetings left pending are picked up by the next sweep.
                Ok(_) => Ok(Next::Done),
                // The meeting was moved after this resolver was scheduled.
                Err(Error::VotingNotEnded(_)) => Ok(Next::RunAt(due_at(&meeting))),
                Err(e) => Err(e),
            }
        }

        async move {
            let (next, result) = match resolve(meeting_id, &store, &policy).await {
                Ok(next) => (next, Ok(())),
                Err(e) => {
                    error!("Resolver for meeting {meeting_id} failed: {e}");
                    warn!("Failed resolver will be retried in {RETRY_INTERVAL_SECONDS} seconds");
                    let retry_at = Utc::now() + Duration::seconds(RETRY_INTERVAL_SECONDS);
                    (Next::RunAt(retry_at), Err(e))
                }
            };
            match next {
                Next::Done => {
                    tasks.lock().await.remove(&meeting_id);
                    trace!("Resolver completed; removed self from list");
                }
                Next::RunAt(run_at) => {
                    let again = Self::resolver(meeting_id, store, policy, tasks.clone());
                    tasks
                        .lock()
                        .await
                        .insert(meeting_id, ScheduledTask::new(again, run_at));
                }
            }
            result
        }
        .boxed()
    }
}

/// A fairing that schedules resolvers for all unresolved meetings during
/// Rocket ignition, and places a [`MeetingResolvers`] into managed state.
/// This fairing depends on the config and store being in managed state,
/// and so must be attached after the fairings responsible for them.
pub struct ResolverFairing;

#[rocket::async_trait]
impl Fairing for ResolverFairing {
    fn info(&self) -> Info {
        Info {
            name: "Meeting Resolvers",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        info!("Scheduling meeting resolvers...");
        let (store, policy) = match (rocket.state::<Store>(), rocket.state::<Config>()) {
            (Some(store), Some(config)) => (store.clone(), config.policy()),
            _ => {
                error!("Store or config was not available when scheduling resolvers");
                return Err(rocket);
            }
        };
        let resolvers = MeetingResolvers::new(store, policy);
        match resolvers.schedule_pending().await {
            Ok(count) => info!("...{count} meeting resolvers scheduled!"),
            Err(e) => {
                error!("Failed to schedule meeting resolvers: {e}");
                return Err(rocket);
            }
        }

        // Manage the state.
        rocket = rocket.manage(resolvers);
        Ok(rocket)
    }
}
