//! Collaborator contracts consumed by the monitor and the catalog.
//!
//! Both loops are generic over these traits so tests can drive them with
//! scripted in-memory sources; production wires in [`crate::api::ApiClient`].

use std::future::Future;
use std::sync::Arc;

use pulpit_proto::protocol::{LiveSession, PublicationStatus, Sermon, SessionStatus};

use crate::error::SourceResult;

pub trait LiveSessionSource: Send + Sync + 'static {
    /// Sessions currently reported with `status`, in source order.
    fn list_sessions(
        &self,
        status: SessionStatus,
    ) -> impl Future<Output = SourceResult<Vec<LiveSession>>> + Send;

    /// Turn an ended broadcast into a permanent catalog entry.  Idempotent on
    /// the server side.
    fn archive_session(&self, id: &str) -> impl Future<Output = SourceResult<()>> + Send;
}

pub trait SermonSource: Send + Sync + 'static {
    /// Sermons with publication state `status`, in source order.
    fn list_sermons(
        &self,
        status: PublicationStatus,
    ) -> impl Future<Output = SourceResult<Vec<Sermon>>> + Send;
}

impl<T: LiveSessionSource> LiveSessionSource for Arc<T> {
    fn list_sessions(
        &self,
        status: SessionStatus,
    ) -> impl Future<Output = SourceResult<Vec<LiveSession>>> + Send {
        (**self).list_sessions(status)
    }

    fn archive_session(&self, id: &str) -> impl Future<Output = SourceResult<()>> + Send {
        (**self).archive_session(id)
    }
}

impl<T: SermonSource> SermonSource for Arc<T> {
    fn list_sermons(
        &self,
        status: PublicationStatus,
    ) -> impl Future<Output = SourceResult<Vec<Sermon>>> + Send {
        (**self).list_sermons(status)
    }
}
