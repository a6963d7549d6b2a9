pub mod file_reconciler;
pub mod report_download;
pub mod selectors;
pub mod session_service;

pub use file_reconciler::FileReconciler;
pub use report_download::ReportDownload;
pub use session_service::SessionService;
