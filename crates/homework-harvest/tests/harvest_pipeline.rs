//! Session client, harvester and full query pipeline against a mock platform.

use std::sync::Arc;

use homework_harvest::query::{self, QueryResponse};
use homework_harvest::{
    FilterSpec, FinishStatus, HarvestConfig, HarvestError, Harvester, HomeworkKind, LoginMethod,
    NoopDriver, NoopSolver, Session, SessionClient, Credentials, STATUS_NOT_SUBMITTED,
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEMESTER: &str = "2026202701";

// ─────────────────────── helpers ───────────────────────

fn config_for(server: &MockServer) -> HarvestConfig {
    HarvestConfig {
        base_url: format!("{}/ve", server.uri()),
        ..Default::default()
    }
}

fn client_for(server: &MockServer) -> SessionClient {
    SessionClient::new(&config_for(server), Session::with_cookie("JSESSIONID", "abc123")).unwrap()
}

fn homework(id: u32, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "end_time": null,
        "content": "<p>Submit the <b>report</b></p>",
        "subStatus": STATUS_NOT_SUBMITTED,
        "submitCount": 3,
        "allCount": 41,
        "open_date": "2026-10-08"
    })
}

async fn mount_semester(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/ve/back/rp/common/teachCalendar.shtml"))
        .and(query_param("method", "queryCurrentXq"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .and(header("Cookie", "JSESSIONID=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/ve/back/coursePlatform/message.shtml"))
        .and(query_param("method", "getArticleList"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionId": "S-77"})))
        .mount(server)
        .await;
}

async fn mount_courses(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/ve/back/coursePlatform/course.shtml"))
        .and(query_param("method", "getCourseList"))
        .and(query_param("xqCode", SEMESTER))
        .and(query_param("pagesize", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "courseList": [
                {"id": 101, "course_num": "M101", "name": "大学物理", "fz_id": 11, "teacher_id": "t1"},
                {"id": 102, "course_num": "M102", "name": "高等数学", "fz_id": 12, "teacher_id": "t2"},
                {"name": "no id, ignored"}
            ]
        })))
        .mount(server)
        .await;
}

/// Subtype 0 has one record per course; subtypes 1 and 2 are empty.
async fn mount_homework(server: &MockServer) {
    for (cid, title) in [("101", "Lab report 1"), ("102", "Problem set 4")] {
        Mock::given(method("GET"))
            .and(path("/ve/back/coursePlatform/homeWork.shtml"))
            .and(query_param("cId", cid))
            .and(query_param("subType", "0"))
            .and(header("sessionId", "S-77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "courseNoteList": [homework(cid.parse::<u32>().unwrap() * 10, title)]
            })))
            .mount(server)
            .await;
    }
    for sub_type in ["1", "2"] {
        Mock::given(method("GET"))
            .and(path("/ve/back/coursePlatform/homeWork.shtml"))
            .and(query_param("subType", sub_type))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "没有数据"})))
            .mount(server)
            .await;
    }
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn test_harvest_two_courses_one_subtype() {
    let server = MockServer::start().await;
    mount_semester(&server, json!({"result": [{"xqCode": SEMESTER}]})).await;
    mount_token(&server).await;
    mount_courses(&server).await;
    mount_homework(&server).await;

    let report = Harvester::new(client_for(&server)).run().await.unwrap();

    assert_eq!(report.semester, SEMESTER);
    assert_eq!(report.courses.len(), 2);
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.skipped_fetches, 0);

    let names: Vec<&str> = report.records.iter().map(|r| r.course_name.as_str()).collect();
    assert_eq!(names, vec!["大学物理", "高等数学"]);
    assert!(report
        .records
        .iter()
        .all(|r| r.kind == Some(HomeworkKind::Homework)));

    let filter = FilterSpec {
        finish_status: FinishStatus::Unfinished,
        ..Default::default()
    };
    let now = chrono::Local::now().naive_local();
    let canonical = homework_harvest::normalize(&report.records, &filter, now);
    assert_eq!(canonical.len(), 2);
    assert_eq!(canonical[0].due_time, "NAT");
    assert_eq!(canonical[0].content, "Submit the report");
    assert_eq!(canonical[0].total_count, 41);
}

#[tokio::test]
async fn test_homework_referer_names_the_course() {
    let server = MockServer::start().await;
    mount_semester(&server, json!({"result": [{"xqCode": SEMESTER}]})).await;
    mount_token(&server).await;
    mount_courses(&server).await;
    mount_homework(&server).await;

    Harvester::new(client_for(&server)).run().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let referer = requests
        .iter()
        .filter(|r| r.url.path().ends_with("homeWork.shtml"))
        .filter_map(|r| r.headers.get("referer"))
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.contains("cId=101"))
        .expect("homework request carried a referer");

    assert!(referer.contains("method=toCoursePlatform&"));
    assert!(referer.contains("courseId=M101"));
    assert!(referer.contains("xkhId=11"));
    assert!(referer.contains(&format!("xqCode={SEMESTER}")));
    assert!(referer.contains("teacherId=t1"));
}

#[tokio::test]
async fn test_failed_subtype_is_skipped() {
    let server = MockServer::start().await;
    mount_semester(&server, json!({"result": [{"xqCode": SEMESTER}]})).await;
    mount_token(&server).await;
    mount_courses(&server).await;

    Mock::given(method("GET"))
        .and(path("/ve/back/coursePlatform/homeWork.shtml"))
        .and(query_param("cId", "101"))
        .and(query_param("subType", "0"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ve/back/coursePlatform/homeWork.shtml"))
        .and(query_param("cId", "102"))
        .and(query_param("subType", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>session expired</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ve/back/coursePlatform/homeWork.shtml"))
        .and(query_param("subType", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "courseNoteList": [homework(7, "Report")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ve/back/coursePlatform/homeWork.shtml"))
        .and(query_param("subType", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "没有数据"})))
        .mount(&server)
        .await;

    let report = Harvester::new(client_for(&server)).run().await.unwrap();

    assert_eq!(report.skipped_fetches, 2);
    assert_eq!(report.records.len(), 2);
    assert!(report.records.iter().all(|r| r.kind == Some(HomeworkKind::Report)));
}

#[tokio::test]
async fn test_missing_token_endpoint_is_tolerated() {
    let server = MockServer::start().await;
    mount_semester(&server, json!({"result": [{"xqCode": SEMESTER}]})).await;
    mount_courses(&server).await;
    Mock::given(method("GET"))
        .and(path("/ve/back/coursePlatform/homeWork.shtml"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "没有数据"})))
        .mount(&server)
        .await;

    let harvester = Harvester::new(client_for(&server));
    assert_eq!(harvester.session_id().await, "");

    let report = harvester.run().await.unwrap();
    assert_eq!(report.courses.len(), 2);
    assert!(report.records.is_empty());
    assert_eq!(report.skipped_fetches, 0);
}

#[tokio::test]
async fn test_empty_semester_list_is_fatal() {
    let server = MockServer::start().await;
    mount_semester(&server, json!({"result": []})).await;

    let err = Harvester::new(client_for(&server)).run().await.unwrap_err();
    assert!(matches!(err, HarvestError::Upstream { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_course_list_error_envelope_is_fatal() {
    let server = MockServer::start().await;
    mount_semester(&server, json!({"result": [{"xqCode": SEMESTER}]})).await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/ve/back/coursePlatform/course.shtml"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"STATUS": "1", "ERRMSG": "登录超时"})),
        )
        .mount(&server)
        .await;

    let err = Harvester::new(client_for(&server)).run().await.unwrap_err();
    match err {
        HarvestError::Upstream { url, message } => {
            assert!(url.contains("getCourseList"));
            assert_eq!(message, "登录超时");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_query_end_to_end_with_direct_login() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ve/"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "JSESSIONID=abc123; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ve/GetImg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ve/s.shtml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;
    mount_semester(&server, json!({"result": [{"xqCode": SEMESTER}]})).await;
    mount_token(&server).await;
    mount_courses(&server).await;
    mount_homework(&server).await;

    let filter = FilterSpec {
        finish_status: FinishStatus::Unfinished,
        ..Default::default()
    };
    let result = query::run(
        &config_for(&server),
        LoginMethod::DirectForm,
        &Credentials::new("21301001", ""),
        &filter,
        Arc::new(NoopSolver),
        Arc::new(NoopDriver),
    )
    .await;

    let response = QueryResponse::from(result);
    assert!(response.success);
    assert_eq!(response.total, Some(2));
    assert_eq!(response.semester.as_deref(), Some(SEMESTER));

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["data"][1]["course_name"], "高等数学");
    assert_eq!(value["data"][1]["kind"], "homework");
    assert!(value.get("error").is_none());
}
