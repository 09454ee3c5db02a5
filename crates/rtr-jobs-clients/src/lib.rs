//! Collaborator clients for rtr-jobs.
//!
//! Each remote dependency is an async trait with an in-memory implementation
//! for tests and local runs, and a reqwest implementation for the cloud API:
//!
//! - [`ObjectStore`]: custom-object collections (jobs, executions, audits, CSV)
//! - [`SearchService`]: asynchronous saved searches over the event log
//! - [`DeviceService`]: host-group membership counts
//! - [`WorkflowProvisioner`]: workflow definitions created from templates
//!
//! [`FileObjectStore`] additionally persists objects on local disk.

pub mod devices;
pub mod error;
pub mod http_store;
pub mod remote;
pub mod search;
pub mod store;
pub mod workflows;

pub use devices::{DeviceService, HttpDeviceService, MemoryDeviceService};
pub use error::ClientError;
pub use http_store::HttpObjectStore;
pub use remote::RemoteApi;
pub use search::{
    HttpSearchClient, MemorySearchService, PollSettings, ResultPage, SavedSearchRunner,
    SearchOutcome, SearchService,
};
pub use store::{
    BulkFetch, FetchedPage, FileObjectStore, MemoryObjectStore, ObjectStore, Record, SearchPage,
    SearchRequest, StoredObject, bulk_fetch, search_and_fetch,
};
pub use workflows::{
    HttpWorkflowProvisioner, MemoryWorkflowProvisioner, ProvisionRequest, WorkflowProvisioner,
};
