use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;

use super::{DbResult, ListResult, get_connection};
use crate::controller::BaseError;
use crate::schema::enum_def::GenerationStatus;
use crate::{db_execute, db_object};

db_object! {
    #[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
    #[diesel(table_name = video_generation)]
    pub struct VideoGeneration {
        pub id: i64,
        pub user_id: Option<String>,
        pub brand_profile_id: Option<String>,
        pub conversation_id: Option<String>,
        pub message_id: Option<String>,
        pub prompt: String,
        pub provider: String,
        pub provider_job_id: Option<String>,
        pub model: String,
        pub status: GenerationStatus,
        pub video_url: Option<String>,
        pub thumbnail_url: Option<String>,
        pub blob_key: Option<String>,
        pub duration: Option<i32>,
        pub aspect_ratio: Option<String>,
        pub resolution: Option<String>,
        pub cost: Option<i64>,
        pub error: Option<String>,
        pub created_at: i64,
        pub completed_at: Option<i64>,
    }

    #[derive(Insertable, Deserialize, Debug)]
    #[diesel(table_name = video_generation)]
    pub struct NewVideoGeneration {
        pub id: i64,
        pub user_id: Option<String>,
        pub brand_profile_id: Option<String>,
        pub conversation_id: Option<String>,
        pub message_id: Option<String>,
        pub prompt: String,
        pub provider: String,
        pub provider_job_id: Option<String>,
        pub model: String,
        pub status: GenerationStatus,
        pub video_url: Option<String>,
        pub thumbnail_url: Option<String>,
        pub duration: Option<i32>,
        pub aspect_ratio: Option<String>,
        pub resolution: Option<String>,
        pub cost: Option<i64>,
        pub error: Option<String>,
        pub created_at: i64,
        pub completed_at: Option<i64>,
    }

    // Changeset for the single transition into a terminal state. `status` is
    // always written; the optional fields are only written when present.
    #[derive(AsChangeset, Deserialize, Debug, Default)]
    #[diesel(table_name = video_generation)]
    pub struct TerminalGenerationData {
        pub status: Option<GenerationStatus>,
        pub video_url: Option<String>,
        pub thumbnail_url: Option<String>,
        pub duration: Option<i32>,
        pub cost: Option<i64>,
        pub error: Option<String>,
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct GenerationQueryPayload {
    pub status: Option<GenerationStatus>,
    pub brand_profile_id: Option<String>,
    pub user_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl VideoGeneration {
    pub fn create(new_generation: &NewVideoGeneration) -> DbResult<VideoGeneration> {
        let conn = &mut get_connection();
        db_execute!(conn, {
            let db_row = diesel::insert_into(video_generation::table)
                .values(NewVideoGenerationDb::to_db(new_generation))
                .returning(VideoGenerationDb::as_returning())
                .get_result::<VideoGenerationDb>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("Failed to insert generation: {}", e)))
                })?;
            Ok(db_row.from_db())
        })
    }

    pub fn get_by_id(generation_id: i64) -> DbResult<VideoGeneration> {
        let conn = &mut get_connection();
        db_execute!(conn, {
            let db_row = video_generation::table
                .find(generation_id)
                .select(VideoGenerationDb::as_select())
                .first::<VideoGenerationDb>(conn)
                .map_err(|e| match e {
                    diesel::result::Error::NotFound => BaseError::NotFound(Some(format!(
                        "Generation with id {} not found",
                        generation_id
                    ))),
                    _ => BaseError::DatabaseFatal(Some(format!(
                        "Error fetching generation {}: {}",
                        generation_id, e
                    ))),
                })?;
            Ok(db_row.from_db())
        })
    }

    /// Lists generations with filtering, newest first.
    pub fn list(payload: GenerationQueryPayload) -> DbResult<ListResult<VideoGeneration>> {
        let conn = &mut get_connection();
        let limit = payload.limit.unwrap_or(20).clamp(1, 100);
        let offset = payload.offset.unwrap_or(0).max(0);

        db_execute!(conn, {
            let mut query = video_generation::table.into_boxed();
            let mut count_query = video_generation::table.into_boxed();

            if let Some(status) = payload.status {
                query = query.filter(video_generation::dsl::status.eq(status));
                count_query = count_query.filter(video_generation::dsl::status.eq(status));
            }
            if let Some(brand_profile_id) = payload.brand_profile_id.as_ref() {
                query = query
                    .filter(video_generation::dsl::brand_profile_id.eq(brand_profile_id.clone()));
                count_query = count_query
                    .filter(video_generation::dsl::brand_profile_id.eq(brand_profile_id.clone()));
            }
            if let Some(user_id) = payload.user_id.as_ref() {
                query = query.filter(video_generation::dsl::user_id.eq(user_id.clone()));
                count_query = count_query.filter(video_generation::dsl::user_id.eq(user_id.clone()));
            }

            let total = count_query
                .select(diesel::dsl::count_star())
                .first::<i64>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("Failed to count generations: {}", e)))
                })?;

            let rows = query
                .order(video_generation::dsl::created_at.desc())
                .limit(limit)
                .offset(offset)
                .select(VideoGenerationDb::as_select())
                .load::<VideoGenerationDb>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("Failed to list generations: {}", e)))
                })?;

            let list = rows.into_iter().map(|db_row| db_row.from_db()).collect();

            Ok(ListResult {
                total,
                limit,
                offset,
                list,
            })
        })
    }

    /// Writes the transition into a terminal state. The `completed_at IS NULL`
    /// guard makes the write a no-op once a terminal state has been recorded,
    /// so `completed_at` is set at most once.
    pub fn mark_terminal(generation_id: i64, data: &TerminalGenerationData) -> DbResult<usize> {
        let conn = &mut get_connection();
        let current_time = Utc::now().timestamp_millis();
        db_execute!(conn, {
            diesel::update(
                video_generation::table
                    .filter(video_generation::dsl::id.eq(generation_id))
                    .filter(video_generation::dsl::completed_at.is_null()),
            )
            .set((
                TerminalGenerationDataDb::to_db(data),
                video_generation::dsl::completed_at.eq(current_time),
            ))
            .execute(conn)
            .map_err(|e| {
                BaseError::DatabaseFatal(Some(format!(
                    "Failed to finalize generation {}: {}",
                    generation_id, e
                )))
            })
        })
    }

    /// Records where the archived result lives in blob storage.
    pub fn set_blob_key(generation_id: i64, key: &str) -> DbResult<usize> {
        let conn = &mut get_connection();
        db_execute!(conn, {
            diesel::update(video_generation::table.find(generation_id))
                .set(video_generation::dsl::blob_key.eq(key.to_string()))
                .execute(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!(
                        "Failed to set blob key for generation {}: {}",
                        generation_id, e
                    )))
                })
        })
    }

    /// Direct cancellation: non-terminal rows become `error`/"cancelled by
    /// user". A row that is already terminal is left untouched.
    pub fn cancel(generation_id: i64) -> DbResult<VideoGeneration> {
        let data = TerminalGenerationData {
            status: Some(GenerationStatus::Error),
            error: Some("cancelled by user".to_string()),
            ..Default::default()
        };
        Self::mark_terminal(generation_id, &data)?;
        Self::get_by_id(generation_id)
    }

    pub fn delete(generation_id: i64) -> DbResult<usize> {
        let conn = &mut get_connection();
        db_execute!(conn, {
            diesel::delete(video_generation::table.find(generation_id))
                .execute(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!(
                        "Failed to delete generation {}: {}",
                        generation_id, e
                    )))
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ID_GENERATOR;
    use once_cell::sync::Lazy;

    // Points the pool at a throwaway sqlite file. Must run before the first
    // CONFIG access; the TempDir is held for the life of the test binary.
    static TEST_DB_DIR: Lazy<tempfile::TempDir> = Lazy::new(|| {
        let dir = tempfile::tempdir().expect("failed to create test db dir");
        let db_path = dir.path().join("mediagen-test.db");
        unsafe { std::env::set_var("DB_URL", db_path.to_str().unwrap()) };
        dir
    });

    // Serializes the tests that write; the file-backed sqlite pool has no
    // busy handler.
    static DB_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn setup_db() -> std::sync::MutexGuard<'static, ()> {
        Lazy::force(&TEST_DB_DIR);
        DB_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pending_record(id: i64) -> NewVideoGeneration {
        NewVideoGeneration {
            id,
            user_id: None,
            brand_profile_id: None,
            conversation_id: None,
            message_id: None,
            prompt: "a lighthouse in fog".to_string(),
            provider: "luma".to_string(),
            provider_job_id: Some(format!("job-{}", id)),
            model: "ray-2".to_string(),
            status: GenerationStatus::Pending,
            video_url: None,
            thumbnail_url: None,
            duration: Some(5),
            aspect_ratio: None,
            resolution: None,
            cost: Some(320_000),
            error: None,
            created_at: Utc::now().timestamp_millis(),
            completed_at: None,
        }
    }

    #[test]
    fn failed_provider_call_persists_error_record() {
        let _db = setup_db();
        let id = ID_GENERATOR.generate_id();
        let now = Utc::now().timestamp_millis();
        let mut failed = pending_record(id);
        failed.provider_job_id = None;
        failed.status = GenerationStatus::Error;
        failed.error = Some("provider returned 500: internal".to_string());
        failed.completed_at = Some(now);
        VideoGeneration::create(&failed).unwrap();

        let stored = VideoGeneration::get_by_id(id).unwrap();
        assert_eq!(stored.status, GenerationStatus::Error);
        assert!(!stored.error.as_deref().unwrap_or_default().is_empty());
        assert_eq!(stored.completed_at, Some(now));
    }

    #[test]
    fn terminal_write_happens_at_most_once() {
        let _db = setup_db();
        let id = ID_GENERATOR.generate_id();
        VideoGeneration::create(&pending_record(id)).unwrap();

        let first = VideoGeneration::mark_terminal(
            id,
            &TerminalGenerationData {
                status: Some(GenerationStatus::Complete),
                video_url: Some("https://cdn.example/v.mp4".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(first, 1);

        let stored = VideoGeneration::get_by_id(id).unwrap();
        assert_eq!(stored.status, GenerationStatus::Complete);
        let completed_at = stored.completed_at.expect("terminal write records completed_at");

        // A second terminal write is a no-op: 0 rows, nothing overwritten.
        let second = VideoGeneration::mark_terminal(
            id,
            &TerminalGenerationData {
                status: Some(GenerationStatus::Error),
                error: Some("late failure".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(second, 0);

        let unchanged = VideoGeneration::get_by_id(id).unwrap();
        assert_eq!(unchanged.status, GenerationStatus::Complete);
        assert_eq!(unchanged.completed_at, Some(completed_at));
        assert_eq!(unchanged.error, None);
        assert_eq!(
            unchanged.video_url.as_deref(),
            Some("https://cdn.example/v.mp4")
        );
    }

    #[test]
    fn cancel_is_a_noop_on_terminal_rows() {
        let _db = setup_db();
        let id = ID_GENERATOR.generate_id();
        VideoGeneration::create(&pending_record(id)).unwrap();

        let cancelled = VideoGeneration::cancel(id).unwrap();
        assert_eq!(cancelled.status, GenerationStatus::Error);
        assert_eq!(cancelled.error.as_deref(), Some("cancelled by user"));
        assert!(cancelled.completed_at.is_some());

        // Cancelling again returns the row unchanged.
        let again = VideoGeneration::cancel(id).unwrap();
        assert_eq!(again.completed_at, cancelled.completed_at);
    }
}
