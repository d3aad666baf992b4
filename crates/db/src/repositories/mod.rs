pub mod job_repo;
pub mod quota_repo;

pub use job_repo::JobRepo;
pub use quota_repo::QuotaRepo;
