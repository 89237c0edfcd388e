//! Noteful Cloudflare Worker - HTTP API for notes, folders and tags.

use http::StatusCode;
use noteful_core::{CreateNote, NoteQuery, NotefulService, UpdateNote};
use noteful_d1::D1DatabaseWrapper;
use serde::{Deserialize, Deserializer, Serialize};
use worker::*;

/// D1 binding name from `wrangler.toml`.
const DB_BINDING: &str = "NOTEFUL_DB";

/// Body of `POST /notes` and `PUT /notes/:id`. Missing fields stay `None`;
/// an explicit `null` for a nullable field becomes `Some(None)`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    content: Option<Option<String>>,
    #[serde(default, alias = "folder_id", deserialize_with = "double_option")]
    folder_id: Option<Option<i64>>,
    #[serde(default)]
    tags: Option<Vec<i64>>,
}

impl NoteRequest {
    fn into_create(self) -> CreateNote {
        CreateNote {
            title: self.title.unwrap_or_default(),
            content: self.content.flatten(),
            folder_id: self.folder_id.flatten(),
            tags: self.tags.unwrap_or_default(),
        }
    }

    fn into_update(self) -> UpdateNote {
        UpdateNote {
            title: self.title,
            content: self.content,
            folder_id: self.folder_id,
            tags: self.tags,
        }
    }
}

/// Body of folder and tag writes.
#[derive(Deserialize)]
struct NameRequest {
    #[serde(default)]
    name: Option<String>,
}

impl NameRequest {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
    status: u16,
}

impl ErrorResponse {
    fn new(msg: &str, status: StatusCode) -> Self {
        Self {
            message: msg.to_string(),
            status: status.as_u16(),
        }
    }
}

fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn json_response<T: Serialize>(data: &T, status: StatusCode) -> Result<Response> {
    let body = serde_json::to_string(data).map_err(|e| Error::RustError(e.to_string()))?;
    let mut response = Response::ok(body)?;
    response
        .headers_mut()
        .set("Content-Type", "application/json")?;
    Ok(response.with_status(status.as_u16()))
}

fn created<T: Serialize>(data: &T, location: &str) -> Result<Response> {
    let mut response = json_response(data, StatusCode::CREATED)?;
    response.headers_mut().set("Location", location)?;
    Ok(response)
}

fn no_content() -> Result<Response> {
    Ok(Response::empty()?.with_status(StatusCode::NO_CONTENT.as_u16()))
}

fn json_error(msg: &str, status: StatusCode) -> Result<Response> {
    json_response(&ErrorResponse::new(msg, status), status)
}

fn not_found() -> Result<Response> {
    json_error("Not Found", StatusCode::NOT_FOUND)
}

fn invalid_json(e: Error) -> Result<Response> {
    json_error(&format!("Invalid JSON: {}", e), StatusCode::BAD_REQUEST)
}

fn service_error(err: noteful_core::Error) -> Result<Response> {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        console_error!("request failed: {}", err);
    }
    json_error(&err.to_string(), status)
}

fn get_service(env: &Env) -> Result<NotefulService<D1DatabaseWrapper>> {
    let db = env.d1(DB_BINDING)?;
    Ok(NotefulService::new(D1DatabaseWrapper::new(db)))
}

/// Path id; unparsable ids map to 0, which matches no row.
fn param_id(ctx: &RouteContext<()>) -> i64 {
    ctx.param("id").and_then(|s| s.parse().ok()).unwrap_or(0)
}

fn location(url: &Url, collection: &str, id: i64) -> String {
    format!("{}/{}/{}", url.origin().ascii_serialization(), collection, id)
}

fn parse_query_string(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

fn parse_query_id(url: &Url, key: &str) -> std::result::Result<Option<i64>, String> {
    parse_query_string(url, key)
        .map(|v| v.parse().map_err(|_| format!("invalid `{}`: {}", key, v)))
        .transpose()
}

fn parse_note_query(url: &Url) -> std::result::Result<NoteQuery, String> {
    Ok(NoteQuery {
        search_term: parse_query_string(url, "searchTerm"),
        folder_id: parse_query_id(url, "folderId")?,
        tag_id: parse_query_id(url, "tagId")?,
    })
}

#[event(fetch)]
async fn main(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    Router::new()
        // GET /notes - List notes
        .get_async("/notes", |req, ctx| async move {
            let service = get_service(&ctx.env)?;
            let url = req.url()?;

            let query = match parse_note_query(&url) {
                Ok(q) => q,
                Err(msg) => return json_error(&msg, StatusCode::BAD_REQUEST),
            };

            match service.list_notes(query).await {
                Ok(notes) => json_response(&notes, StatusCode::OK),
                Err(e) => service_error(e),
            }
        })
        // GET /notes/:id - Get single note
        .get_async("/notes/:id", |_, ctx| async move {
            let service = get_service(&ctx.env)?;

            match service.get_note(param_id(&ctx)).await {
                Ok(Some(note)) => json_response(&note, StatusCode::OK),
                Ok(None) => not_found(),
                Err(e) => service_error(e),
            }
        })
        // POST /notes - Create note
        .post_async("/notes", |mut req, ctx| async move {
            let service = get_service(&ctx.env)?;
            let url = req.url()?;

            let body: NoteRequest = match req.json().await {
                Ok(b) => b,
                Err(e) => return invalid_json(e),
            };

            match service.create_note(body.into_create()).await {
                Ok(note) => created(&note, &location(&url, "notes", note.id)),
                Err(e) => service_error(e),
            }
        })
        // PUT /notes/:id - Update note
        .put_async("/notes/:id", |mut req, ctx| async move {
            let service = get_service(&ctx.env)?;

            let body: NoteRequest = match req.json().await {
                Ok(b) => b,
                Err(e) => return invalid_json(e),
            };

            match service.update_note(param_id(&ctx), body.into_update()).await {
                Ok(Some(note)) => json_response(&note, StatusCode::OK),
                Ok(None) => not_found(),
                Err(e) => service_error(e),
            }
        })
        // DELETE /notes/:id - Delete note (204 whether or not it existed)
        .delete_async("/notes/:id", |_, ctx| async move {
            let service = get_service(&ctx.env)?;

            match service.delete_note(param_id(&ctx)).await {
                Ok(_) => no_content(),
                Err(e) => service_error(e),
            }
        })
        // GET /folders - List folders
        .get_async("/folders", |_, ctx| async move {
            let service = get_service(&ctx.env)?;

            match service.list_folders().await {
                Ok(folders) => json_response(&folders, StatusCode::OK),
                Err(e) => service_error(e),
            }
        })
        // GET /folders/:id - Get single folder
        .get_async("/folders/:id", |_, ctx| async move {
            let service = get_service(&ctx.env)?;

            match service.get_folder(param_id(&ctx)).await {
                Ok(Some(folder)) => json_response(&folder, StatusCode::OK),
                Ok(None) => not_found(),
                Err(e) => service_error(e),
            }
        })
        // POST /folders - Create folder
        .post_async("/folders", |mut req, ctx| async move {
            let service = get_service(&ctx.env)?;
            let url = req.url()?;

            let body: NameRequest = match req.json().await {
                Ok(b) => b,
                Err(e) => return invalid_json(e),
            };

            match service.create_folder(body.name()).await {
                Ok(folder) => created(&folder, &location(&url, "folders", folder.id)),
                Err(e) => service_error(e),
            }
        })
        // PUT /folders/:id - Rename folder
        .put_async("/folders/:id", |mut req, ctx| async move {
            let service = get_service(&ctx.env)?;

            let body: NameRequest = match req.json().await {
                Ok(b) => b,
                Err(e) => return invalid_json(e),
            };

            match service.update_folder(param_id(&ctx), body.name()).await {
                Ok(Some(folder)) => json_response(&folder, StatusCode::OK),
                Ok(None) => not_found(),
                Err(e) => service_error(e),
            }
        })
        // DELETE /folders/:id - Delete folder
        .delete_async("/folders/:id", |_, ctx| async move {
            let service = get_service(&ctx.env)?;

            match service.delete_folder(param_id(&ctx)).await {
                Ok(_) => no_content(),
                Err(e) => service_error(e),
            }
        })
        // GET /tags - List tags
        .get_async("/tags", |_, ctx| async move {
            let service = get_service(&ctx.env)?;

            match service.list_tags().await {
                Ok(tags) => json_response(&tags, StatusCode::OK),
                Err(e) => service_error(e),
            }
        })
        // GET /tags/:id - Get single tag
        .get_async("/tags/:id", |_, ctx| async move {
            let service = get_service(&ctx.env)?;

            match service.get_tag(param_id(&ctx)).await {
                Ok(Some(tag)) => json_response(&tag, StatusCode::OK),
                Ok(None) => not_found(),
                Err(e) => service_error(e),
            }
        })
        // POST /tags - Create tag
        .post_async("/tags", |mut req, ctx| async move {
            let service = get_service(&ctx.env)?;
            let url = req.url()?;

            let body: NameRequest = match req.json().await {
                Ok(b) => b,
                Err(e) => return invalid_json(e),
            };

            match service.create_tag(body.name()).await {
                Ok(tag) => created(&tag, &location(&url, "tags", tag.id)),
                Err(e) => service_error(e),
            }
        })
        // PUT /tags/:id - Rename tag
        .put_async("/tags/:id", |mut req, ctx| async move {
            let service = get_service(&ctx.env)?;

            let body: NameRequest = match req.json().await {
                Ok(b) => b,
                Err(e) => return invalid_json(e),
            };

            match service.update_tag(param_id(&ctx), body.name()).await {
                Ok(Some(tag)) => json_response(&tag, StatusCode::OK),
                Ok(None) => not_found(),
                Err(e) => service_error(e),
            }
        })
        // DELETE /tags/:id - Delete tag
        .delete_async("/tags/:id", |_, ctx| async move {
            let service = get_service(&ctx.env)?;

            match service.delete_tag(param_id(&ctx)).await {
                Ok(_) => no_content(),
                Err(e) => service_error(e),
            }
        })
        // POST /migrate - Run migrations
        .post_async("/migrate", |_, ctx| async move {
            let db = ctx.env.d1(DB_BINDING)?;
            let wrapper = D1DatabaseWrapper::new(db);

            match wrapper.run_migrations().await {
                Ok(()) => no_content(),
                Err(e) => service_error(e),
            }
        })
        // Health check
        .get("/", |_, _| Response::ok("Noteful API"))
        // Unknown paths get the JSON error body too
        .or_else_any_method("/*path", |_, _| not_found())
        .run(req, env)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_request_missing_vs_null() {
        let body: NoteRequest =
            serde_json::from_str(r#"{"title": "herp", "content": null}"#).unwrap();
        let update = body.into_update();
        assert_eq!(update.title.as_deref(), Some("herp"));
        assert_eq!(update.content, Some(None));
        assert_eq!(update.folder_id, None);
        assert_eq!(update.tags, None);
    }

    #[test]
    fn test_note_request_folder_id_alias() {
        let body: NoteRequest = serde_json::from_str(
            r#"{"title": "hello", "content": "goodbye", "folder_id": 101, "tags": [1, 2]}"#,
        )
        .unwrap();
        let create = body.into_create();
        assert_eq!(create.folder_id, Some(101));
        assert_eq!(create.tags, vec![1, 2]);
        assert_eq!(create.content.as_deref(), Some("goodbye"));
    }

    #[test]
    fn test_note_request_without_title() {
        let body: NoteRequest =
            serde_json::from_str(r#"{"content": "goodbye", "folderId": 101}"#).unwrap();
        let create = body.into_create();
        assert!(create.title.is_empty());
        assert_eq!(create.folder_id, Some(101));
        assert!(create.tags.is_empty());
    }

    #[test]
    fn test_parse_note_query() {
        let url = Url::parse("https://api.test/notes?searchTerm=about%20cats&folderId=101&tagId=")
            .unwrap();
        let query = parse_note_query(&url).unwrap();
        assert_eq!(query.search_term.as_deref(), Some("about cats"));
        assert_eq!(query.folder_id, Some(101));
        assert_eq!(query.tag_id, None);

        let bad = Url::parse("https://api.test/notes?tagId=abc").unwrap();
        assert!(parse_note_query(&bad).is_err());
    }

    #[test]
    fn test_error_body_shape() {
        let body =
            serde_json::to_value(ErrorResponse::new("Not Found", StatusCode::NOT_FOUND)).unwrap();
        assert_eq!(body, serde_json::json!({"message": "Not Found", "status": 404}));
    }

    #[test]
    fn test_location() {
        let url = Url::parse("https://api.test/notes").unwrap();
        assert_eq!(location(&url, "notes", 7), "https://api.test/notes/7");
    }
}
