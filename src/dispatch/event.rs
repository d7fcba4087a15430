//! Events flowing into the dispatcher.
//!
//! Every side effect in the engine starts as one of these: either a local
//! client did something (posted, followed, liked...) or a remote server
//! delivered an activity to an inbox. Both shapes carry an
//! (activity, object) pair that the dispatcher routes on, plus the domain
//! model the upstream layer already persisted.

use crate::data::models::{
    Account, Block, Follow, FollowRequest, Report, Status, StatusFave,
};

/// ActivityStreams activity verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityType {
    Create,
    Update,
    Accept,
    Reject,
    Undo,
    Delete,
    Flag,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Accept => "Accept",
            Self::Reject => "Reject",
            Self::Undo => "Undo",
            Self::Delete => "Delete",
            Self::Flag => "Flag",
        }
    }
}

/// What the activity acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Note,
    Profile,
    Follow,
    Like,
    Announce,
    Block,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Note => "Note",
            Self::Profile => "Profile",
            Self::Follow => "Follow",
            Self::Like => "Like",
            Self::Announce => "Announce",
            Self::Block => "Block",
        }
    }
}

/// The domain model an event carries.
#[derive(Debug, Clone)]
pub enum Model {
    Status(Status),
    Account(Account),
    Follow(Follow),
    FollowRequest(FollowRequest),
    Fave(StatusFave),
    Block(Block),
    Report(Report),
}

impl Model {
    pub fn into_status(self) -> crate::error::Result<Status> {
        match self {
            Self::Status(status) => Ok(status),
            other => Err(unexpected(&other, "status")),
        }
    }

    pub fn into_account(self) -> crate::error::Result<Account> {
        match self {
            Self::Account(account) => Ok(account),
            other => Err(unexpected(&other, "account")),
        }
    }

    pub fn into_follow(self) -> crate::error::Result<Follow> {
        match self {
            Self::Follow(follow) => Ok(follow),
            other => Err(unexpected(&other, "follow")),
        }
    }

    pub fn into_follow_request(self) -> crate::error::Result<FollowRequest> {
        match self {
            Self::FollowRequest(request) => Ok(request),
            other => Err(unexpected(&other, "follow request")),
        }
    }

    pub fn into_fave(self) -> crate::error::Result<StatusFave> {
        match self {
            Self::Fave(fave) => Ok(fave),
            other => Err(unexpected(&other, "fave")),
        }
    }

    pub fn into_block(self) -> crate::error::Result<Block> {
        match self {
            Self::Block(block) => Ok(block),
            other => Err(unexpected(&other, "block")),
        }
    }

    pub fn into_report(self) -> crate::error::Result<Report> {
        match self {
            Self::Report(report) => Ok(report),
            other => Err(unexpected(&other, "report")),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Account(_) => "account",
            Self::Follow(_) => "follow",
            Self::FollowRequest(_) => "follow request",
            Self::Fave(_) => "fave",
            Self::Block(_) => "block",
            Self::Report(_) => "report",
        }
    }
}

fn unexpected(model: &Model, wanted: &str) -> crate::error::AppError {
    crate::error::AppError::Validation(format!(
        "event carried a {} model where a {} was expected",
        model.kind(),
        wanted
    ))
}

/// An action performed by a local client, already persisted upstream.
#[derive(Debug, Clone)]
pub struct ClientEvent {
    pub activity: ActivityType,
    pub object: ObjectType,
    pub model: Model,
    /// The local account that performed the action.
    pub origin_account: Account,
    /// The other account involved, when there is one.
    pub target_account: Option<Account>,
}

/// An activity received from a remote server, signature already verified
/// upstream.
#[derive(Debug, Clone)]
pub struct FederatorEvent {
    pub activity: ActivityType,
    pub object: ObjectType,
    /// Absent when the remote only sent an IRI; the dispatcher then
    /// dereferences it.
    pub model: Option<Model>,
    /// ActivityPub IRI of the object, for dereferencing.
    pub iri: Option<String>,
    /// The local account whose inbox received the activity.
    pub receiving_account: Account,
}
