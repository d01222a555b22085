//! Session facade: every operation runs as the identity's current user.

use domain::models::{
    Activity, InviteEdit, Membership, NewActivity, PageCursor, QuickStatus, RoomEvent,
};
use domain::ports::{Gateway, Identity, InMemoryGateway, RealtimeChannel};
use domain::services::{
    ActivityService, EditOutcome, FeedKind, JoinOutcome, MembershipService, RoomService,
};
use persistence::{create_pool, map_sqlx_error, run_migrations, PgRealtimeChannel, PostgresGateway};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::error::ClientError;
use crate::logging::init_logging;
use crate::views::{FeedView, RoomView, ViewSettings};

pub struct FeedClient {
    gateway: Arc<dyn Gateway>,
    realtime: Arc<dyn RealtimeChannel>,
    identity: Arc<dyn Identity>,
    activities: ActivityService,
    memberships: MembershipService,
    rooms: RoomService,
    settings: ViewSettings,
}

impl FeedClient {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        realtime: Arc<dyn RealtimeChannel>,
        identity: Arc<dyn Identity>,
        settings: ViewSettings,
    ) -> Self {
        Self {
            activities: ActivityService::new(gateway.clone()),
            memberships: MembershipService::new(gateway.clone()),
            rooms: RoomService::new(gateway.clone()),
            gateway,
            realtime,
            identity,
            settings,
        }
    }

    /// Client backed by one in-memory store serving both queries and pushes.
    pub fn in_memory(
        gateway: Arc<InMemoryGateway>,
        identity: Arc<dyn Identity>,
        settings: ViewSettings,
    ) -> Self {
        Self::new(gateway.clone(), gateway, identity, settings)
    }

    /// Connects to PostgreSQL, applies migrations and builds a client on top.
    pub async fn connect(config: &Config, identity: Arc<dyn Identity>) -> Result<Self, ClientError> {
        config.validate()?;

        let pool = create_pool(&config.database)
            .await
            .map_err(map_sqlx_error)?;
        run_migrations(&pool)
            .await
            .map_err(|e| ClientError::Transient(format!("Migrations failed: {}", e)))?;

        tracing::info!(
            max_connections = config.database.max_connections,
            realtime = config.realtime.enabled,
            "Connected to invite store"
        );

        Ok(Self::new(
            Arc::new(PostgresGateway::new(pool.clone())),
            Arc::new(PgRealtimeChannel::new(pool)),
            identity,
            ViewSettings::from_config(config),
        ))
    }

    /// Loads configuration, initializes logging and connects.
    pub async fn from_env(identity: Arc<dyn Identity>) -> Result<Self, ClientError> {
        let config = Config::load()?;
        init_logging(&config.logging);
        Self::connect(&config, identity).await
    }

    pub fn settings(&self) -> &ViewSettings {
        &self.settings
    }

    fn current_user(&self) -> Result<Uuid, ClientError> {
        self.identity
            .current_user_id()
            .ok_or(ClientError::NotAuthenticated)
    }

    fn realtime(&self) -> Option<Arc<dyn RealtimeChannel>> {
        self.settings.realtime.then(|| self.realtime.clone())
    }

    pub async fn create_activity(&self, input: &NewActivity) -> Result<Activity, ClientError> {
        let user_id = self.current_user()?;
        Ok(self.activities.create(user_id, input).await?)
    }

    pub async fn get_activity(&self, activity_id: Uuid) -> Result<Activity, ClientError> {
        Ok(self.activities.get(activity_id).await?)
    }

    pub async fn edit_activity(
        &self,
        activity_id: Uuid,
        edit: &InviteEdit,
    ) -> Result<EditOutcome, ClientError> {
        let user_id = self.current_user()?;
        Ok(self.activities.edit(user_id, activity_id, edit).await?)
    }

    pub async fn close_activity(&self, activity_id: Uuid) -> Result<Activity, ClientError> {
        let user_id = self.current_user()?;
        Ok(self.activities.close(user_id, activity_id).await?)
    }

    pub async fn join(&self, activity_id: Uuid) -> Result<JoinOutcome, ClientError> {
        let user_id = self.current_user()?;
        Ok(self.memberships.join(activity_id, user_id).await?)
    }

    pub async fn leave(&self, activity_id: Uuid) -> Result<Membership, ClientError> {
        let user_id = self.current_user()?;
        Ok(self.memberships.leave(activity_id, user_id).await?)
    }

    /// All of the current user's membership rows, joined and left.
    pub async fn memberships(&self) -> Result<Vec<Membership>, ClientError> {
        let user_id = self.current_user()?;
        Ok(self.memberships.get_memberships(user_id).await?)
    }

    pub async fn open_feed(&self, kind: FeedKind) -> Result<FeedView, ClientError> {
        let user_id = self.current_user()?;
        FeedView::open(
            kind,
            user_id,
            self.gateway.clone(),
            self.realtime(),
            &self.settings,
        )
        .await
    }

    /// Opens a feed that continues after a [`FeedSnapshot::next_cursor`] token.
    ///
    /// [`FeedSnapshot::next_cursor`]: crate::FeedSnapshot::next_cursor
    pub async fn open_feed_after(&self, kind: FeedKind, cursor: &str) -> Result<FeedView, ClientError> {
        let user_id = self.current_user()?;
        let cursor = PageCursor::from_token(cursor)
            .map_err(|e| ClientError::Rejected(format!("Invalid page cursor: {}", e)))?;
        FeedView::open_after(
            kind,
            user_id,
            self.gateway.clone(),
            self.realtime(),
            &self.settings,
            cursor,
        )
        .await
    }

    pub async fn open_room(&self, activity_id: Uuid) -> Result<RoomView, ClientError> {
        let user_id = self.current_user()?;
        RoomView::open(
            self.rooms.clone(),
            self.realtime(),
            activity_id,
            user_id,
            &self.settings,
        )
        .await
    }

    pub async fn send_chat(&self, activity_id: Uuid, text: &str) -> Result<RoomEvent, ClientError> {
        let user_id = self.current_user()?;
        Ok(self.rooms.send_chat(activity_id, user_id, text).await?)
    }

    pub async fn send_quick(
        &self,
        activity_id: Uuid,
        status: QuickStatus,
    ) -> Result<RoomEvent, ClientError> {
        let user_id = self.current_user()?;
        Ok(self.rooms.send_quick(activity_id, user_id, status).await?)
    }
}
