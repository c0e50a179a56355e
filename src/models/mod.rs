//! Request and Response models for the HTTP API
//!
//! DTOs used to (de)serialize request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::{
    BatchUpdateRequest, ClearRequest, QueryRequest, RecordUpdate, SaveRecordsRequest, SetRequest,
    UpdateRecordRequest,
};
pub use responses::{
    ClearResponse, DeleteResponse, ErrorResponse, GetResponse, HealthResponse, RecordResponse,
    RecordsResponse, SetResponse, StatsResponse, StoreStatsResponse, WriteResponse,
};
