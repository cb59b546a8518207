use tonic::{Code, Status};

use crate::domain::{ErrorKind, ServiceError};

pub fn code_for(kind: ErrorKind) -> Code {
    match kind {
        ErrorKind::NotFound => Code::NotFound,
        ErrorKind::InvalidArgument => Code::InvalidArgument,
        ErrorKind::Internal => Code::Internal,
    }
}

pub fn to_status(path: &str, err: &ServiceError) -> Status {
    let code = code_for(err.kind());
    if code == Code::Internal {
        tracing::error!(path, error = %err, "gRPC call failed");
    } else {
        tracing::debug!(path, error = %err, "gRPC call rejected");
    }
    Status::new(code, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SkuId;

    #[test]
    fn test_status_codes_follow_error_kind() {
        let status = to_status("/x", &ServiceError::SkuNotFound(SkuId(7)));
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "sku not found: 7");

        let status = to_status("/x", &ServiceError::InsufficientStock { requested: 2, available: 1 });
        assert_eq!(status.code(), Code::InvalidArgument);

        let status = to_status("/x", &ServiceError::StockLookup("unavailable".into()));
        assert_eq!(status.code(), Code::Internal);
    }
}
