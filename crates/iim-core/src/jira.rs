//! Blocking Jira Cloud client implementing [`Tracker`].
//!
//! Search uses the enhanced JQL endpoint (`GET /rest/api/3/search/jql`),
//! which pages with `nextPageToken` until `isLast` is set. Single issues come
//! from `GET /rest/api/3/issue/{key}`, where 404 means no such issue. Updates are
//! partial edits (`PUT /rest/api/3/issue/{key}`) carrying only the fields
//! that changed.

use crate::config::Settings;
use crate::error::{IimError, Result};
use crate::tracker::{validate_issue_key, Tracker, TrackerIssue};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

const PAGE_SIZE: u32 = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BODY_LIMIT: usize = 300;

pub struct JiraClient {
    http: Client,
    base_url: String,
    username: String,
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    #[serde(default)]
    issues: Vec<TrackerIssue>,
    #[serde(default)]
    is_last: Option<bool>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl JiraClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("iim/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            username: settings.username.clone(),
            token: settings.token.clone(),
        })
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.basic_auth(&self.username, Some(&self.token))
            .header(ACCEPT, "application/json")
    }
}

impl Tracker for JiraClient {
    fn search(&self, jql: &str) -> Result<Vec<TrackerIssue>> {
        let url = format!("{}/rest/api/3/search/jql", self.base_url);
        let mut issues = Vec::new();
        let mut next_page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("jql", jql.to_string()),
                ("maxResults", PAGE_SIZE.to_string()),
                ("fields", "*all".to_string()),
            ];
            if let Some(token) = &next_page_token {
                query.push(("nextPageToken", token.clone()));
            }

            tracing::debug!(jql, page = ?next_page_token, "searching issues");
            let resp = self.authed(self.http.get(&url)).query(&query).send()?;
            let page: SearchPage = check_status(resp, "search")?.json()?;
            issues.extend(page.issues);

            if page.is_last == Some(true) {
                break;
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => next_page_token = Some(token),
                // Not last, but no way to continue either.
                _ => break,
            }
        }

        tracing::debug!(count = issues.len(), "search complete");
        Ok(issues)
    }

    fn get_issue(&self, key: &str) -> Result<TrackerIssue> {
        validate_issue_key(key)?;
        let url = format!("{}/rest/api/3/issue/{key}", self.base_url);
        tracing::debug!(key, "fetching issue");
        let resp = self
            .authed(self.http.get(&url))
            .query(&[("fields", "*all")])
            .send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(IimError::IssueNotFound(key.to_string()));
        }
        Ok(check_status(resp, &format!("fetch {key}"))?.json()?)
    }

    fn update_fields(&self, key: &str, fields: &Map<String, Value>) -> Result<()> {
        validate_issue_key(key)?;
        let url = format!("{}/rest/api/3/issue/{key}", self.base_url);
        tracing::debug!(key, fields = fields.len(), "updating issue");
        let resp = self
            .authed(self.http.put(&url))
            .json(&json!({ "fields": fields }))
            .send()?;
        check_status(resp, &format!("update {key}"))?;
        Ok(())
    }
}

/// Turn a non-2xx response into a remote error that carries the status and
/// the start of the body, which is where Jira puts its error messages.
fn check_status(resp: Response, context: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    let body: String = body.trim().chars().take(ERROR_BODY_LIMIT).collect();
    Err(IimError::remote(context, format!("HTTP {status}: {body}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> JiraClient {
        let settings = Settings::from_lookup(
            |name| match name {
                "JIRA_URL" => Some(server.url()),
                "JIRA_USERNAME" => Some("me".to_string()),
                "JIRA_PASSWORD" => Some("tok".to_string()),
                _ => None,
            },
            &FileConfig::default(),
        )
        .unwrap();
        JiraClient::new(&settings).unwrap()
    }

    #[test]
    fn search_follows_page_tokens() {
        let mut server = mockito::Server::new();
        let first = server
            .mock("GET", "/rest/api/3/search/jql")
            .match_query(Matcher::Regex(r"fields=\*all$".into()))
            .match_header("authorization", "Basic bWU6dG9r")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "issues": [{ "key": "IIM-1", "fields": { "summary": "one" } }],
                    "nextPageToken": "tok2",
                    "isLast": false
                })
                .to_string(),
            )
            .create();
        let second = server
            .mock("GET", "/rest/api/3/search/jql")
            .match_query(Matcher::UrlEncoded("nextPageToken".into(), "tok2".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "issues": [{ "key": "IIM-2", "fields": { "summary": "two" } }],
                    "isLast": true
                })
                .to_string(),
            )
            .create();

        let issues = client(&server).search("project = \"IIM\"").unwrap();
        let keys: Vec<_> = issues.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, ["IIM-1", "IIM-2"]);
        first.assert();
        second.assert();
    }

    #[test]
    fn search_stops_without_token() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/rest/api/3/search/jql")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"issues": []}"#)
            .expect(1)
            .create();

        assert!(client(&server).search("key = IIM-1").unwrap().is_empty());
        mock.assert();
    }

    #[test]
    fn search_sends_jql() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/rest/api/3/search/jql")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("jql".into(), "key = IIM-5".into()),
                Matcher::UrlEncoded("maxResults".into(), "100".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"issues": [], "isLast": true}"#)
            .create();

        client(&server).search("key = IIM-5").unwrap();
        mock.assert();
    }

    #[test]
    fn get_issue_reads_single_issue() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/rest/api/3/issue/IIM-4")
            .match_header("authorization", "Basic bWU6dG9r")
            .match_query(Matcher::UrlEncoded("fields".into(), "*all".into()))
            .with_status(200)
            .with_body(r#"{"id": "10004", "key": "IIM-4", "fields": {"summary": "Queue backlog"}}"#)
            .create();

        let issue = client(&server).get_issue("IIM-4").unwrap();
        assert_eq!(issue.key, "IIM-4");
        assert_eq!(issue.fields["summary"], json!("Queue backlog"));
        mock.assert();
    }

    #[test]
    fn unknown_issue_is_a_lookup_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/rest/api/3/issue/IIM-404")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"errorMessages": ["Issue does not exist or you do not have permission to see it."]}"#)
            .create();

        let err = client(&server).get_issue("IIM-404").unwrap_err();
        assert!(matches!(&err, IimError::IssueNotFound(k) if k == "IIM-404"));
        assert_eq!(err.kind(), crate::error::ErrorKind::Lookup);
    }

    #[test]
    fn update_sends_only_given_fields() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("PUT", "/rest/api/3/issue/IIM-1")
            .match_header("authorization", "Basic bWU6dG9r")
            .match_body(Matcher::Json(json!({
                "fields": { "customfield_10319": { "value": "High" } }
            })))
            .with_status(204)
            .create();

        let mut fields = Map::new();
        fields.insert("customfield_10319".into(), json!({ "value": "High" }));
        client(&server).update_fields("IIM-1", &fields).unwrap();
        mock.assert();
    }

    #[test]
    fn http_errors_become_remote_errors() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/rest/api/3/search/jql")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("Unauthorized; scheme=Basic")
            .create();

        let err = client(&server).search("key = IIM-1").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Remote);
        let msg = err.to_string();
        assert!(msg.starts_with("search: HTTP 401"), "{msg}");
        assert!(msg.contains("Unauthorized"));
    }

    #[test]
    fn update_rejects_bad_key_without_request() {
        let server = mockito::Server::new();
        let err = client(&server)
            .update_fields("../admin", &Map::new())
            .unwrap_err();
        assert!(matches!(err, IimError::InvalidIssueKey(_)));
    }
}
