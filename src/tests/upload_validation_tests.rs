use crate::errors::ApiError;
use crate::models::RequestUploadBody;
use crate::routes::vault::validate_upload;

fn allowed() -> Vec<String> {
    vec![
        "application/pdf".to_string(),
        "text/plain".to_string(),
        "image/png".to_string(),
    ]
}

fn body(file_name: &str, size_bytes: i64, mime_type: &str) -> RequestUploadBody {
    RequestUploadBody {
        file_name: file_name.to_string(),
        size_bytes,
        mime_type: mime_type.to_string(),
        tags: Vec::new(),
    }
}

const FIFTY_MB: i64 = 50 * 1024 * 1024;

#[test]
fn accepts_allowed_type_within_limit() {
    let result = validate_upload(&body("notes.txt", 1024, "text/plain"), &allowed(), FIFTY_MB);
    assert_eq!(result.unwrap(), "text/plain");
}

#[test]
fn rejects_one_byte_over_the_ceiling() {
    let result = validate_upload(
        &body("big.pdf", FIFTY_MB + 1, "application/pdf"),
        &allowed(),
        FIFTY_MB,
    );
    assert!(matches!(result, Err(ApiError::PayloadTooLarge { .. })));
}

#[test]
fn accepts_exactly_the_ceiling() {
    let result = validate_upload(
        &body("exact.pdf", FIFTY_MB, "application/pdf"),
        &allowed(),
        FIFTY_MB,
    );
    assert!(result.is_ok());
}

#[test]
fn rejects_disallowed_mime_type() {
    let result = validate_upload(
        &body("movie.mp4", 1024, "video/mp4"),
        &allowed(),
        FIFTY_MB,
    );
    assert!(matches!(result, Err(ApiError::Validation { .. })));
}

#[test]
fn rejects_zero_and_negative_sizes() {
    assert!(validate_upload(&body("a.txt", 0, "text/plain"), &allowed(), FIFTY_MB).is_err());
    assert!(validate_upload(&body("a.txt", -1, "text/plain"), &allowed(), FIFTY_MB).is_err());
}

#[test]
fn rejects_empty_file_name() {
    let result = validate_upload(&body("  ", 10, "text/plain"), &allowed(), FIFTY_MB);
    assert!(matches!(result, Err(ApiError::Validation { .. })));
}

#[test]
fn octet_stream_falls_back_to_extension_guess() {
    let result = validate_upload(
        &body("scan.png", 1024, "application/octet-stream"),
        &allowed(),
        FIFTY_MB,
    );
    assert_eq!(result.unwrap(), "image/png");
}

#[test]
fn mime_comparison_is_case_insensitive() {
    let result = validate_upload(&body("doc.pdf", 10, "Application/PDF"), &allowed(), FIFTY_MB);
    assert_eq!(result.unwrap(), "application/pdf");
}
