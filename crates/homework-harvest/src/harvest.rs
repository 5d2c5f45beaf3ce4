//! Course and homework harvesting.
//!
//! One run walks semester -> secondary token -> course list -> three homework
//! subtypes per course, sequentially over a single [`SessionClient`]. Semester
//! and course-list failures abort the run; a failing homework fetch is logged,
//! counted in [`HarvestReport::skipped_fetches`] and skipped.

use crate::client::SessionClient;
use crate::error::{HarvestError, HarvestResult};
use crate::types::{Course, HomeworkKind, RawHomework};
use serde::Serialize;
use serde_json::Value;

const SEMESTER_PATH: &str = "back/rp/common/teachCalendar.shtml";
const MESSAGE_PATH: &str = "back/coursePlatform/message.shtml";
const COURSE_PATH: &str = "back/coursePlatform/course.shtml";
const HOMEWORK_PATH: &str = "back/coursePlatform/homeWork.shtml";
const PLATFORM_PATH: &str = "back/coursePlatform/coursePlatform.shtml";

/// Single page large enough for one student's courses. There is no
/// pagination loop; larger course lists are truncated upstream.
const PAGE_SIZE: &str = "100";

/// The homework endpoint answers an empty category with this message.
const NO_DATA: &str = "没有数据";

/// Everything one harvest run produced.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub semester: String,
    pub courses: Vec<Course>,
    pub records: Vec<RawHomework>,
    /// Homework fetches that failed and were skipped.
    pub skipped_fetches: usize,
}

pub struct Harvester {
    client: SessionClient,
}

impl Harvester {
    pub fn new(client: SessionClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> HarvestResult<String> {
        let base = self.client.url_for(path);
        url::Url::parse_with_params(&base, params)
            .map(String::from)
            .map_err(|e| HarvestError::Config(format!("{base}: {e}")))
    }

    fn platform_index(&self) -> HarvestResult<String> {
        self.url(PLATFORM_PATH, &[("method", "toCoursePlatformIndex")])
    }

    /// Code of the active academic term, from the first calendar entry.
    pub async fn current_semester(&self) -> HarvestResult<String> {
        let url = self.url(SEMESTER_PATH, &[("method", "queryCurrentXq")])?;
        let body = self.client.get_json(&url, None).await?;

        let code = body
            .get("result")
            .and_then(Value::as_array)
            .and_then(|entries| entries.first())
            .and_then(|first| first.get("xqCode"))
            .and_then(|code| match code {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|code| !code.is_empty());

        code.ok_or_else(|| HarvestError::upstream(&url, "no current semester in calendar response"))
    }

    /// Secondary session token. Best-effort: any failure gives `""`.
    pub async fn session_id(&self) -> String {
        match self.article_list().await {
            Ok(body) => body
                .get("sessionId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "secondary session token unavailable, continuing without it");
                String::new()
            }
        }
    }

    async fn article_list(&self) -> HarvestResult<Value> {
        let url = self.url(MESSAGE_PATH, &[("method", "getArticleList")])?;
        let referer = self.platform_index()?;
        self.client.get_json(&url, Some(&referer)).await
    }

    pub async fn list_courses(&self, semester: &str) -> HarvestResult<Vec<Course>> {
        let url = self.url(
            COURSE_PATH,
            &[
                ("method", "getCourseList"),
                ("pagesize", PAGE_SIZE),
                ("page", "1"),
                ("xqCode", semester),
            ],
        )?;
        let referer = self.platform_index()?;
        let body = self.client.get_json(&url, Some(&referer)).await?;

        let entries = body
            .get("courseList")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let courses: Vec<Course> = entries.iter().filter_map(Course::from_upstream).collect();
        if courses.len() < entries.len() {
            tracing::warn!(
                dropped = entries.len() - courses.len(),
                "ignored course entries without an id"
            );
        }
        Ok(courses)
    }

    /// One homework category of one course, tagged with course name and kind.
    pub async fn fetch_homework(
        &self,
        course: &Course,
        semester: &str,
        kind: HomeworkKind,
    ) -> HarvestResult<Vec<RawHomework>> {
        let sub_type = kind.sub_type().to_string();
        let url = self.url(
            HOMEWORK_PATH,
            &[
                ("method", "getHomeWorkList"),
                ("cId", course.id.as_str()),
                ("subType", sub_type.as_str()),
                ("page", "1"),
                ("pagesize", PAGE_SIZE),
            ],
        )?;
        let referer = self.url(
            PLATFORM_PATH,
            &[
                ("method", "toCoursePlatform"),
                ("courseId", course.course_num.as_str()),
                ("dataSource", "1"),
                ("cId", course.id.as_str()),
                ("xkhId", course.fz_id.as_str()),
                ("xqCode", semester),
                ("teacherId", course.teacher_id.as_str()),
            ],
        )?;

        let body = self.client.get_json(&url, Some(&referer)).await?;
        if body.get("message").and_then(Value::as_str) == Some(NO_DATA) {
            return Ok(Vec::new());
        }

        let records = body
            .get("courseNoteList")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .map(|item| {
                        let mut raw = RawHomework::from_upstream(item);
                        raw.course_name = course.name.clone();
                        raw.kind = Some(kind);
                        raw
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    /// All three categories of one course. Failed categories are skipped.
    ///
    /// Returns the records and the number of skipped fetches.
    pub async fn homework_for_course(&self, course: &Course, semester: &str) -> (Vec<RawHomework>, usize) {
        let mut records = Vec::new();
        let mut skipped = 0;

        for kind in HomeworkKind::ALL {
            match self.fetch_homework(course, semester, kind).await {
                Ok(mut batch) => {
                    tracing::debug!(
                        course = %course.name,
                        sub_type = kind.sub_type(),
                        records = batch.len(),
                        "fetched homework"
                    );
                    records.append(&mut batch);
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        course = %course.name,
                        sub_type = kind.sub_type(),
                        error = %e,
                        "homework fetch failed, skipping"
                    );
                }
            }
        }
        (records, skipped)
    }

    /// Full run: semester, token, courses, homework.
    pub async fn run(mut self) -> HarvestResult<HarvestReport> {
        let semester = self.current_semester().await?;
        tracing::info!(semester = %semester, "resolved current semester");

        let token = self.session_id().await;
        self.client.set_secondary_token(token);

        let courses = self.list_courses(&semester).await?;
        tracing::info!(semester = %semester, courses = courses.len(), "listed courses");

        let mut records = Vec::new();
        let mut skipped_fetches = 0;
        for course in &courses {
            let (mut batch, skipped) = self.homework_for_course(course, &semester).await;
            records.append(&mut batch);
            skipped_fetches += skipped;
        }

        tracing::info!(
            semester = %semester,
            records = records.len(),
            skipped = skipped_fetches,
            "harvest finished"
        );

        Ok(HarvestReport {
            semester,
            courses,
            records,
            skipped_fetches,
        })
    }
}
