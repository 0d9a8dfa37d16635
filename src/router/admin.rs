use crate::{
    error::UploadsError,
    uploads::{FolderInfo, Outcome, UploadsManager},
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_macros::debug_handler;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub(super) fn admin_router(uploads: UploadsManager) -> Router {
    let router = Router::new()
        .route("/upload", get(folder_info))
        .route("/upload/folder", post(create_folder).delete(delete_folder))
        .route("/upload/file", post(upload_file).delete(delete_file))
        .with_state(uploads);

    Router::new().nest("/admin", router)
}

#[derive(Debug, Deserialize)]
pub struct FolderQuery {
    #[serde(default)]
    pub folder: String,
}

#[derive(Debug, Deserialize)]
pub struct NewFolder {
    #[serde(default)]
    pub folder: String,
    pub new_folder: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFolder {
    #[serde(default)]
    pub folder: String,
    pub del_folder: String,
}

#[derive(Debug, Deserialize)]
pub struct FileUpload {
    #[serde(default)]
    pub folder: String,
    pub file_name: String,
    /// Base64 encoded file content
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFile {
    #[serde(default)]
    pub folder: String,
    pub del_file: String,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
}

type Reply = (StatusCode, Json<UploadResponse>);

fn reply(outcome: Outcome, success: String) -> Reply {
    if outcome.is_done() {
        return (
            StatusCode::OK,
            Json(UploadResponse {
                success: true,
                message: success,
            }),
        );
    }

    debug!("Refused: {outcome}");

    (
        StatusCode::CONFLICT,
        Json(UploadResponse {
            success: false,
            message: outcome.to_string(),
        }),
    )
}

#[debug_handler]
async fn folder_info(
    uploads: State<UploadsManager>,
    query: Query<FolderQuery>,
) -> Result<Json<FolderInfo>, UploadsError> {
    debug!("Listing {}", query.folder);
    Ok(Json(uploads.folder_info(&query.folder)?))
}

#[debug_handler]
async fn create_folder(
    uploads: State<UploadsManager>,
    Json(NewFolder { folder, new_folder }): Json<NewFolder>,
) -> Result<Reply, UploadsError> {
    info!("Creating folder {new_folder} in {folder}");
    let outcome = uploads.create_directory(&format!("{folder}/{new_folder}"))?;
    Ok(reply(outcome, format!("Folder '{new_folder}' created.")))
}

#[debug_handler]
async fn delete_folder(
    uploads: State<UploadsManager>,
    Json(DeleteFolder { folder, del_folder }): Json<DeleteFolder>,
) -> Result<Reply, UploadsError> {
    info!("Deleting folder {del_folder} in {folder}");
    let outcome = uploads.delete_directory(&format!("{folder}/{del_folder}"))?;
    Ok(reply(outcome, format!("Folder '{del_folder}' deleted.")))
}

#[debug_handler]
async fn upload_file(
    uploads: State<UploadsManager>,
    Json(FileUpload {
        folder,
        file_name,
        content,
    }): Json<FileUpload>,
) -> Result<Reply, UploadsError> {
    let content = STANDARD.decode(content)?;
    info!("Uploading {file_name} ({} bytes) to {folder}", content.len());
    let outcome = uploads.save_file(&format!("{folder}/{file_name}"), &content)?;
    Ok(reply(outcome, format!("File '{file_name}' uploaded.")))
}

#[debug_handler]
async fn delete_file(
    uploads: State<UploadsManager>,
    Json(DeleteFile { folder, del_file }): Json<DeleteFile>,
) -> Result<Reply, UploadsError> {
    info!("Deleting file {del_file} in {folder}");
    let outcome = uploads.delete_file(&format!("{folder}/{del_file}"))?;
    Ok(reply(outcome, format!("File '{del_file}' deleted.")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mime::MimeTypes,
        storage::{MemoryDisk, Storage, StorageError},
        uploads::WebPaths,
    };
    use std::sync::Arc;

    fn uploads() -> (Arc<MemoryDisk>, State<UploadsManager>) {
        let disk = Arc::new(MemoryDisk::new());
        let manager = UploadsManager::new(
            disk.clone(),
            Arc::new(MimeTypes),
            WebPaths {
                webpath: "/uploads".to_string(),
                url: Some("http://localhost:3030".to_string()),
            },
        );
        (disk, State(manager))
    }

    #[tokio::test]
    async fn lists_folder() {
        let (disk, uploads) = uploads();
        disk.put("/docs/cv.pdf", b"pdf").unwrap();

        let Json(info) = folder_info(
            uploads,
            Query(FolderQuery {
                folder: "docs".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!("/docs", info.folder);
        assert_eq!("docs", info.folder_name);
        assert_eq!(
            "http://localhost:3030/uploads/docs/cv.pdf",
            info.files[0].web_path
        );
    }

    #[tokio::test]
    async fn creates_then_refuses_folder() {
        let (disk, uploads) = uploads();

        let request = || {
            Json(NewFolder {
                folder: "/".to_string(),
                new_folder: "photos".to_string(),
            })
        };

        let (status, Json(body)) = create_folder(uploads.clone(), request()).await.unwrap();
        assert_eq!(StatusCode::OK, status);
        assert_eq!(
            UploadResponse {
                success: true,
                message: "Folder 'photos' created.".to_string()
            },
            body
        );
        assert!(disk.exists("/photos").unwrap());

        let (status, Json(body)) = create_folder(uploads, request()).await.unwrap();
        assert_eq!(StatusCode::CONFLICT, status);
        assert_eq!("Folder '/photos' already exists.", body.message);
        assert!(!body.success);
    }

    #[tokio::test]
    async fn refuses_to_delete_full_folder() {
        let (disk, uploads) = uploads();
        disk.put("/photos/cat.png", b"png").unwrap();

        let (status, Json(body)) = delete_folder(
            uploads,
            Json(DeleteFolder {
                folder: "/".to_string(),
                del_folder: "photos".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(StatusCode::CONFLICT, status);
        assert_eq!("Directory must be empty to delete it.", body.message);
        assert!(disk.exists("/photos/cat.png").unwrap());
    }

    #[tokio::test]
    async fn uploads_and_deletes_file() {
        let (disk, uploads) = uploads();

        let (status, Json(body)) = upload_file(
            uploads.clone(),
            Json(FileUpload {
                folder: "/notes".to_string(),
                file_name: "hello.txt".to_string(),
                content: STANDARD.encode("hello"),
            }),
        )
        .await
        .unwrap();

        assert_eq!(StatusCode::OK, status);
        assert_eq!("File 'hello.txt' uploaded.", body.message);
        assert_eq!(Some(b"hello".to_vec()), disk.read("/notes/hello.txt"));

        let (status, Json(body)) = delete_file(
            uploads,
            Json(DeleteFile {
                folder: "/notes".to_string(),
                del_file: "hello.txt".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(StatusCode::OK, status);
        assert_eq!("File 'hello.txt' deleted.", body.message);
        assert!(!disk.exists("/notes/hello.txt").unwrap());
    }

    #[tokio::test]
    async fn rejects_bad_base64() {
        let (_, uploads) = uploads();

        let result = upload_file(
            uploads,
            Json(FileUpload {
                folder: "/".to_string(),
                file_name: "x.bin".to_string(),
                content: "not base64!".to_string(),
            }),
        )
        .await;

        assert!(matches!(result, Err(UploadsError::Base64(_))));
    }

    #[tokio::test]
    async fn propagates_disk_failures() {
        let (_, uploads) = uploads();

        let result = delete_folder(
            uploads,
            Json(DeleteFolder {
                folder: "/".to_string(),
                del_folder: "missing".to_string(),
            }),
        )
        .await;

        assert!(matches!(
            result,
            Err(UploadsError::Storage(StorageError::NotFound(_)))
        ));
    }
}
