#![allow(dead_code)]
//! Common test utilities: an in-memory storage backend, recording
//! collaborators, and a fully wired engine harness.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use rookery::config::{InstanceConfig, TimelineConfig};
use rookery::data::models::{
    Account, Block, Follow, FollowRequest, List, Mention, Notification, NotificationType, Status,
    StatusFave, Visibility,
};
use rookery::data::Storage;
use rookery::dispatch::event::{ActivityType, ClientEvent, FederatorEvent, Model, ObjectType};
use rookery::dispatch::Dispatcher;
use rookery::email::{EmailSender, ReportEmail};
use rookery::error::Result;
use rookery::federation::{Federator, OutgoingActivity};
use rookery::stream::{StreamEvent, StreamingSink};

pub const LOCAL_DOMAIN: &str = "local.test";

// =============================================================================
// In-memory storage
// =============================================================================

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    statuses: HashMap<String, Status>,
    follows: Vec<Follow>,
    follow_requests: Vec<FollowRequest>,
    mentions: Vec<Mention>,
    notifications: Vec<Notification>,
    faves: Vec<StatusFave>,
    bookmarks: Vec<(String, String)>,
    lists: Vec<List>,
    list_members: Vec<(String, String)>,
    detached_attachments: Vec<String>,
    deleted_attachments: Vec<String>,
    instance_account_id: Option<String>,
}

/// Storage fake backed by hash maps; "no rows" is `None`/empty, never an
/// error, matching the trait contract.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: Mutex<Inner>,
    /// Number of `get_status` calls, a proxy for prepare work.
    pub status_reads: AtomicUsize,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn add_account(&self, account: Account) {
        self.lock().accounts.insert(account.id.clone(), account);
    }

    pub fn add_status(&self, status: Status) {
        self.lock().statuses.insert(status.id.clone(), status);
    }

    pub fn add_follow(&self, follow: Follow) {
        self.lock().follows.push(follow);
    }

    pub fn add_follow_request(&self, request: FollowRequest) {
        self.lock().follow_requests.push(request);
    }

    pub fn add_mention(&self, mention: Mention) {
        self.lock().mentions.push(mention);
    }

    pub fn add_list(&self, list: List, member_ids: &[&str]) {
        let mut inner = self.lock();
        for member in member_ids {
            inner
                .list_members
                .push((list.id.clone(), member.to_string()));
        }
        inner.lists.push(list);
    }

    pub fn add_fave(&self, fave: StatusFave) {
        self.lock().faves.push(fave);
    }

    pub fn add_bookmark(&self, account_id: &str, status_id: &str) {
        self.lock()
            .bookmarks
            .push((account_id.to_string(), status_id.to_string()));
    }

    pub fn set_instance_account(&self, account: Account) {
        let mut inner = self.lock();
        inner.instance_account_id = Some(account.id.clone());
        inner.accounts.insert(account.id.clone(), account);
    }

    pub fn notifications_for(&self, account_id: &str) -> Vec<Notification> {
        self.lock()
            .notifications
            .iter()
            .filter(|n| n.target_account_id == account_id)
            .cloned()
            .collect()
    }

    pub fn all_notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    pub fn has_status(&self, status_id: &str) -> bool {
        self.lock().statuses.contains_key(status_id)
    }

    pub fn has_account(&self, account_id: &str) -> bool {
        self.lock().accounts.contains_key(account_id)
    }

    pub fn detached_attachments(&self) -> Vec<String> {
        self.lock().detached_attachments.clone()
    }

    pub fn deleted_attachments(&self) -> Vec<String> {
        self.lock().deleted_attachments.clone()
    }

    pub fn follow_between(&self, account_id: &str, target_account_id: &str) -> Option<Follow> {
        self.lock()
            .follows
            .iter()
            .find(|f| f.account_id == account_id && f.target_account_id == target_account_id)
            .cloned()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_account(&self, id: &str) -> Result<Option<Account>> {
        Ok(self.lock().accounts.get(id).cloned())
    }

    async fn get_account_by_uri(&self, uri: &str) -> Result<Option<Account>> {
        Ok(self
            .lock()
            .accounts
            .values()
            .find(|a| a.uri == uri)
            .cloned())
    }

    async fn put_account(&self, account: &Account) -> Result<()> {
        self.add_account(account.clone());
        Ok(())
    }

    async fn get_instance_account(&self) -> Result<Account> {
        let inner = self.lock();
        let id = inner
            .instance_account_id
            .as_ref()
            .expect("instance account seeded");
        Ok(inner.accounts[id].clone())
    }

    async fn delete_account(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.accounts.remove(id);
        inner
            .follows
            .retain(|f| f.account_id != id && f.target_account_id != id);
        Ok(())
    }

    async fn get_status(&self, id: &str) -> Result<Option<Status>> {
        self.status_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().statuses.get(id).cloned())
    }

    async fn get_status_by_uri(&self, uri: &str) -> Result<Option<Status>> {
        Ok(self
            .lock()
            .statuses
            .values()
            .find(|s| s.uri == uri)
            .cloned())
    }

    async fn put_status(&self, status: &Status) -> Result<()> {
        self.add_status(status.clone());
        Ok(())
    }

    async fn delete_status(&self, id: &str) -> Result<()> {
        self.lock().statuses.remove(id);
        Ok(())
    }

    async fn get_statuses_by_account(&self, account_id: &str) -> Result<Vec<Status>> {
        let mut statuses: Vec<Status> = self
            .lock()
            .statuses
            .values()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect();
        statuses.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(statuses)
    }

    async fn get_boosts_of(&self, status_id: &str) -> Result<Vec<Status>> {
        Ok(self
            .lock()
            .statuses
            .values()
            .filter(|s| s.boost_of_id.as_deref() == Some(status_id))
            .cloned()
            .collect())
    }

    async fn count_replies(&self, status_id: &str) -> Result<i64> {
        Ok(self
            .lock()
            .statuses
            .values()
            .filter(|s| s.in_reply_to_id.as_deref() == Some(status_id))
            .count() as i64)
    }

    async fn count_boosts(&self, status_id: &str) -> Result<i64> {
        Ok(self
            .lock()
            .statuses
            .values()
            .filter(|s| s.boost_of_id.as_deref() == Some(status_id))
            .count() as i64)
    }

    async fn count_faves(&self, status_id: &str) -> Result<i64> {
        Ok(self
            .lock()
            .faves
            .iter()
            .filter(|f| f.status_id == status_id)
            .count() as i64)
    }

    async fn get_home_page<'a>(
        &self,
        account_id: &str,
        max_id: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Status>> {
        let inner = self.lock();
        let mut followed: Vec<&str> = inner
            .follows
            .iter()
            .filter(|f| f.account_id == account_id)
            .map(|f| f.target_account_id.as_str())
            .collect();
        followed.push(account_id);

        let mut page: Vec<Status> = inner
            .statuses
            .values()
            .filter(|s| followed.contains(&s.account_id.as_str()))
            .filter(|s| max_id.is_none_or(|max| s.id.as_str() < max))
            .cloned()
            .collect();
        page.sort_by(|a, b| b.id.cmp(&a.id));
        page.truncate(limit);
        Ok(page)
    }

    async fn get_list_page<'a>(
        &self,
        list_id: &str,
        max_id: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Status>> {
        let inner = self.lock();
        let members: Vec<&str> = inner
            .list_members
            .iter()
            .filter(|(l, _)| l == list_id)
            .map(|(_, m)| m.as_str())
            .collect();

        let mut page: Vec<Status> = inner
            .statuses
            .values()
            .filter(|s| members.contains(&s.account_id.as_str()))
            .filter(|s| max_id.is_none_or(|max| s.id.as_str() < max))
            .cloned()
            .collect();
        page.sort_by(|a, b| b.id.cmp(&a.id));
        page.truncate(limit);
        Ok(page)
    }

    async fn get_public_page<'a>(
        &self,
        max_id: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Status>> {
        let mut page: Vec<Status> = self
            .lock()
            .statuses
            .values()
            .filter(|s| s.visibility == Visibility::Public)
            .filter(|s| max_id.is_none_or(|max| s.id.as_str() < max))
            .cloned()
            .collect();
        page.sort_by(|a, b| b.id.cmp(&a.id));
        page.truncate(limit);
        Ok(page)
    }

    async fn get_favourites_page<'a>(
        &self,
        account_id: &str,
        max_id: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Status>> {
        let inner = self.lock();
        let faved: Vec<&str> = inner
            .faves
            .iter()
            .filter(|f| f.account_id == account_id)
            .map(|f| f.status_id.as_str())
            .collect();

        let mut page: Vec<Status> = inner
            .statuses
            .values()
            .filter(|s| faved.contains(&s.id.as_str()))
            .filter(|s| max_id.is_none_or(|max| s.id.as_str() < max))
            .cloned()
            .collect();
        page.sort_by(|a, b| b.id.cmp(&a.id));
        page.truncate(limit);
        Ok(page)
    }

    async fn get_local_followers(&self, account_id: &str) -> Result<Vec<Follow>> {
        let inner = self.lock();
        Ok(inner
            .follows
            .iter()
            .filter(|f| f.target_account_id == account_id)
            .filter(|f| {
                inner
                    .accounts
                    .get(&f.account_id)
                    .is_some_and(|a| a.is_local())
            })
            .cloned()
            .collect())
    }

    async fn get_remote_follower_inboxes(&self, account_id: &str) -> Result<Vec<String>> {
        let inner = self.lock();
        Ok(inner
            .follows
            .iter()
            .filter(|f| f.target_account_id == account_id)
            .filter_map(|f| inner.accounts.get(&f.account_id))
            .filter(|a| !a.is_local())
            .map(|a| {
                a.shared_inbox_uri
                    .clone()
                    .unwrap_or_else(|| a.inbox_uri.clone())
            })
            .collect())
    }

    async fn get_follow(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> Result<Option<Follow>> {
        Ok(self.follow_between(account_id, target_account_id))
    }

    async fn delete_follow(&self, id: &str) -> Result<()> {
        self.lock().follows.retain(|f| f.id != id);
        Ok(())
    }

    async fn get_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> Result<Option<FollowRequest>> {
        Ok(self
            .lock()
            .follow_requests
            .iter()
            .find(|r| r.account_id == account_id && r.target_account_id == target_account_id)
            .cloned())
    }

    async fn accept_follow_request(&self, id: &str) -> Result<Follow> {
        let mut inner = self.lock();
        let position = inner
            .follow_requests
            .iter()
            .position(|r| r.id == id)
            .expect("follow request exists");
        let request = inner.follow_requests.remove(position);
        let follow = Follow {
            id: request.id,
            uri: request.uri,
            account_id: request.account_id,
            target_account_id: request.target_account_id,
            show_reblogs: true,
            notify: false,
            created_at: Utc::now(),
        };
        inner.follows.push(follow.clone());
        Ok(follow)
    }

    async fn delete_follow_request(&self, id: &str) -> Result<()> {
        self.lock().follow_requests.retain(|r| r.id != id);
        Ok(())
    }

    async fn get_lists_containing(
        &self,
        owner_account_id: &str,
        member_account_id: &str,
    ) -> Result<Vec<List>> {
        let inner = self.lock();
        Ok(inner
            .lists
            .iter()
            .filter(|l| l.account_id == owner_account_id)
            .filter(|l| {
                inner
                    .list_members
                    .iter()
                    .any(|(list_id, member)| list_id == &l.id && member == member_account_id)
            })
            .cloned()
            .collect())
    }

    async fn get_mentions(&self, status_id: &str) -> Result<Vec<Mention>> {
        Ok(self
            .lock()
            .mentions
            .iter()
            .filter(|m| m.status_id == status_id)
            .cloned()
            .collect())
    }

    async fn delete_mentions_for_status(&self, status_id: &str) -> Result<()> {
        self.lock().mentions.retain(|m| m.status_id != status_id);
        Ok(())
    }

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .find(|n| n.id == id)
            .cloned())
    }

    async fn find_notification<'a>(
        &self,
        notification_type: NotificationType,
        target_account_id: &str,
        origin_account_id: &str,
        status_id: Option<&'a str>,
    ) -> Result<Option<Notification>> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .find(|n| {
                n.notification_type == notification_type
                    && n.target_account_id == target_account_id
                    && n.origin_account_id == origin_account_id
                    && n.status_id.as_deref() == status_id
            })
            .cloned())
    }

    async fn put_notification(&self, notification: &Notification) -> Result<()> {
        self.lock().notifications.push(notification.clone());
        Ok(())
    }

    async fn delete_notification(&self, id: &str) -> Result<()> {
        self.lock().notifications.retain(|n| n.id != id);
        Ok(())
    }

    async fn delete_notifications_for_status(&self, status_id: &str) -> Result<Vec<String>> {
        let mut inner = self.lock();
        let deleted: Vec<String> = inner
            .notifications
            .iter()
            .filter(|n| n.status_id.as_deref() == Some(status_id))
            .map(|n| n.id.clone())
            .collect();
        inner
            .notifications
            .retain(|n| n.status_id.as_deref() != Some(status_id));
        Ok(deleted)
    }

    async fn get_notifications_page<'a>(
        &self,
        target_account_id: &str,
        max_id: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        let mut page: Vec<Notification> = self
            .lock()
            .notifications
            .iter()
            .filter(|n| n.target_account_id == target_account_id)
            .filter(|n| max_id.is_none_or(|max| n.id.as_str() < max))
            .cloned()
            .collect();
        page.sort_by(|a, b| b.id.cmp(&a.id));
        page.truncate(limit);
        Ok(page)
    }

    async fn delete_fave(&self, id: &str) -> Result<()> {
        self.lock().faves.retain(|f| f.id != id);
        Ok(())
    }

    async fn delete_faves_for_status(&self, status_id: &str) -> Result<()> {
        self.lock().faves.retain(|f| f.status_id != status_id);
        Ok(())
    }

    async fn delete_bookmarks_for_status(&self, status_id: &str) -> Result<()> {
        self.lock().bookmarks.retain(|(_, s)| s != status_id);
        Ok(())
    }

    async fn detach_attachment(&self, id: &str) -> Result<()> {
        self.lock().detached_attachments.push(id.to_string());
        Ok(())
    }

    async fn delete_attachment(&self, id: &str) -> Result<()> {
        self.lock().deleted_attachments.push(id.to_string());
        Ok(())
    }
}

// =============================================================================
// Recording collaborators
// =============================================================================

/// Federator fake that records what would have gone over the wire.
#[derive(Default)]
pub struct RecordingFederator {
    pub sent: Mutex<Vec<(String, OutgoingActivity)>>,
}

impl RecordingFederator {
    pub fn sent_activities(&self) -> Vec<(String, OutgoingActivity)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Federator for RecordingFederator {
    async fn send(&self, sender: &Account, activity: OutgoingActivity) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((sender.id.clone(), activity));
        Ok(())
    }

    async fn dereference_status(&self, _uri: &str) -> Result<Option<Status>> {
        Ok(None)
    }

    async fn dereference_account(&self, _uri: &str) -> Result<Option<Account>> {
        Ok(None)
    }
}

/// Streaming fake that records every push.
#[derive(Default)]
pub struct RecordingSink {
    pub pushed: Mutex<Vec<(String, StreamEvent)>>,
}

impl RecordingSink {
    pub fn events_for(&self, account_id: &str) -> Vec<StreamEvent> {
        self.pushed
            .lock()
            .unwrap()
            .iter()
            .filter(|(owner, _)| owner == account_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn all_events(&self) -> Vec<(String, StreamEvent)> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamingSink for RecordingSink {
    async fn push(&self, account_id: &str, event: StreamEvent) {
        self.pushed
            .lock()
            .unwrap()
            .push((account_id.to_string(), event));
    }
}

/// Email fake that records report notices.
#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<ReportEmail>>,
}

#[async_trait]
impl EmailSender for RecordingEmail {
    async fn send_report_email(&self, email: ReportEmail) -> Result<()> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

// =============================================================================
// Engine harness and fixtures
// =============================================================================

/// A fully wired engine over the in-memory backends.
pub struct TestEngine {
    pub storage: Arc<InMemoryStorage>,
    pub federator: Arc<RecordingFederator>,
    pub streams: Arc<RecordingSink>,
    pub email: Arc<RecordingEmail>,
    pub dispatcher: Arc<Dispatcher>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_timeline_config(TimelineConfig::default())
    }

    pub fn with_timeline_config(timeline: TimelineConfig) -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        let federator = Arc::new(RecordingFederator::default());
        let streams = Arc::new(RecordingSink::default());
        let email = Arc::new(RecordingEmail::default());
        let instance = InstanceConfig {
            domain: LOCAL_DOMAIN.to_string(),
            title: "Rookery Test".to_string(),
            moderator_emails: vec!["mods@local.test".to_string()],
            forward_reports: true,
        };
        let dispatcher = Arc::new(Dispatcher::new(
            storage.clone(),
            federator.clone(),
            streams.clone(),
            email.clone(),
            instance,
            timeline,
        ));
        Self {
            storage,
            federator,
            streams,
            email,
            dispatcher,
        }
    }
}

pub fn local_account(id: &str, username: &str) -> Account {
    Account {
        id: id.to_string(),
        username: username.to_string(),
        domain: None,
        uri: format!("https://{LOCAL_DOMAIN}/users/{username}"),
        outbox_uri: format!("https://{LOCAL_DOMAIN}/users/{username}/outbox"),
        inbox_uri: format!("https://{LOCAL_DOMAIN}/users/{username}/inbox"),
        shared_inbox_uri: None,
        display_name: None,
        locked: false,
        private_key_pem: Some("test-key".to_string()),
        public_key_pem: "test-pub".to_string(),
        created_at: Utc::now(),
    }
}

pub fn remote_account(id: &str, username: &str, domain: &str) -> Account {
    Account {
        id: id.to_string(),
        username: username.to_string(),
        domain: Some(domain.to_string()),
        uri: format!("https://{domain}/users/{username}"),
        outbox_uri: format!("https://{domain}/users/{username}/outbox"),
        inbox_uri: format!("https://{domain}/users/{username}/inbox"),
        shared_inbox_uri: Some(format!("https://{domain}/inbox")),
        display_name: None,
        locked: false,
        private_key_pem: None,
        public_key_pem: "test-pub".to_string(),
        created_at: Utc::now(),
    }
}

pub fn status(id: &str, account: &Account) -> Status {
    Status {
        id: id.to_string(),
        uri: format!("{}/statuses/{id}", account.uri),
        account_id: account.id.clone(),
        content: format!("<p>status {id}</p>"),
        visibility: Visibility::Public,
        boost_of_id: None,
        boost_of_account_id: None,
        in_reply_to_id: None,
        mention_ids: Vec::new(),
        attachment_ids: Vec::new(),
        federated: true,
        created_at: Utc::now(),
    }
}

pub fn boost(id: &str, booster: &Account, original: &Status) -> Status {
    Status {
        id: id.to_string(),
        uri: format!("{}/statuses/{id}", booster.uri),
        account_id: booster.id.clone(),
        content: String::new(),
        visibility: Visibility::Public,
        boost_of_id: Some(original.id.clone()),
        boost_of_account_id: Some(original.account_id.clone()),
        in_reply_to_id: None,
        mention_ids: Vec::new(),
        attachment_ids: Vec::new(),
        federated: true,
        created_at: Utc::now(),
    }
}

pub fn follow(id: &str, account: &Account, target: &Account) -> Follow {
    Follow {
        id: id.to_string(),
        uri: format!("{}/follows/{id}", account.uri),
        account_id: account.id.clone(),
        target_account_id: target.id.clone(),
        show_reblogs: true,
        notify: false,
        created_at: Utc::now(),
    }
}

pub fn follow_request(id: &str, account: &Account, target: &Account) -> FollowRequest {
    FollowRequest {
        id: id.to_string(),
        uri: format!("{}/follows/{id}", account.uri),
        account_id: account.id.clone(),
        target_account_id: target.id.clone(),
        created_at: Utc::now(),
    }
}

pub fn fave(id: &str, account: &Account, status: &Status) -> StatusFave {
    StatusFave {
        id: id.to_string(),
        uri: format!("{}/likes/{id}", account.uri),
        account_id: account.id.clone(),
        target_account_id: status.account_id.clone(),
        status_id: status.id.clone(),
        created_at: Utc::now(),
    }
}

pub fn block(id: &str, account: &Account, target: &Account) -> Block {
    Block {
        id: id.to_string(),
        uri: format!("{}/blocks/{id}", account.uri),
        account_id: account.id.clone(),
        target_account_id: target.id.clone(),
        created_at: Utc::now(),
    }
}

pub fn mention(id: &str, status: &Status, target: &Account) -> Mention {
    Mention {
        id: id.to_string(),
        status_id: status.id.clone(),
        origin_account_id: status.account_id.clone(),
        target_account_id: target.id.clone(),
    }
}

pub fn client_event(
    activity: ActivityType,
    object: ObjectType,
    model: Model,
    origin: &Account,
    target: Option<&Account>,
) -> ClientEvent {
    ClientEvent {
        activity,
        object,
        model,
        origin_account: origin.clone(),
        target_account: target.cloned(),
    }
}

pub fn federator_event(
    activity: ActivityType,
    object: ObjectType,
    model: Option<Model>,
    receiving: &Account,
) -> FederatorEvent {
    FederatorEvent {
        activity,
        object,
        model,
        iri: None,
        receiving_account: receiving.clone(),
    }
}
