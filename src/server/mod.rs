//! Web interface: an upload form that runs the pipeline and shows the alignment and tree.

#[cfg(test)]
mod tests;

use crate::align::{Aligner, AlignerArgs};
use crate::pipeline::{self, Output, PipelineError, Request};
use crate::render::{self, escape, RenderStyle};
use crate::tree::Method;
use crate::upload::{accept_attribute, Upload};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use indoc::formatdoc;
use itertools::Itertools;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use strum::IntoEnumIterator;

const TITLE: &str = "Interactive Phylogenetic Tree Builder";

// ----------------------------------------------------------------------------
// Args
// ----------------------------------------------------------------------------

/// Serve the web interface arguments.
#[derive(Clone, Debug, Deserialize, Parser, PartialEq, Serialize)]
#[clap(verbatim_doc_comment)]
pub struct Args {
    /// Address to listen on.
    #[clap(long, default_value_t = Args::default().address)]
    pub address: SocketAddr,

    /// Largest accepted upload, in megabytes.
    #[clap(long, default_value_t = Args::default().max_upload_mb)]
    pub max_upload_mb: usize,

    #[clap(flatten)]
    pub aligner: AlignerArgs,

    #[clap(flatten)]
    pub style: RenderStyle,
}

impl Args {
    /// Returns the upload limit in bytes, saturating at [`usize::MAX`].
    ///
    /// ```rust
    /// use treebuilder::server::Args;
    /// assert_eq!(Args::default().max_upload_bytes(), 16 * 1024 * 1024);
    /// ```
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for Args {
    fn default() -> Self {
        Args {
            address: SocketAddr::from(([127, 0, 0, 1], 8501)),
            max_upload_mb: 16,
            aligner: AlignerArgs::default(),
            style: RenderStyle::default(),
        }
    }
}

// ----------------------------------------------------------------------------
// Router
// ----------------------------------------------------------------------------

/// Shared by every request, never modified after startup.
pub struct AppState {
    pub aligner: Box<dyn Aligner>,
    pub style: RenderStyle,
}

/// Health check response.
#[derive(Debug, Deserialize, Serialize)]
pub struct Health {
    pub status: String,
    pub version: String,
}

/// Returns the application router.
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/build", post(build))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Serve the web interface until the process is stopped.
pub async fn serve(args: &Args) -> Result<(), Report> {
    let state = Arc::new(AppState { aligner: args.aligner.build(), style: args.style.clone() });
    let app = router(state, args.max_upload_bytes());

    let listener = tokio::net::TcpListener::bind(args.address)
        .await
        .wrap_err_with(|| eyre!("Failed to listen on: {}", args.address))?;
    info!("Serving {TITLE} at: http://{}", args.address);
    info!("Aligner: {}", args.aligner.aligner);

    axum::serve(listener, app).await.wrap_err("Server stopped unexpectedly.")?;
    Ok(())
}

// ----------------------------------------------------------------------------
// Handlers
// ----------------------------------------------------------------------------

async fn health() -> Json<Health> {
    Json(Health { status: "ok".to_string(), version: env!("CARGO_PKG_VERSION").to_string() })
}

async fn index() -> Html<String> {
    Html(page(Method::default(), ""))
}

async fn build(State(state): State<Arc<AppState>>, multipart: Multipart) -> (StatusCode, Html<String>) {
    let request = match read_form(multipart).await {
        Ok(request) => request,
        Err(e) => {
            info!("Rejected form submission: {e}");
            return (StatusCode::BAD_REQUEST, Html(page(Method::default(), &error_banner(&e))));
        }
    };
    let method = request.method;

    // the aligner blocks until it exits
    let result = tokio::task::spawn_blocking(move || {
        pipeline::run(&request, state.aligner.as_ref(), &state.style)
    })
    .await
    .wrap_err("Pipeline task did not complete.")
    .and_then(|result| result);

    match result {
        Ok(output) => (StatusCode::OK, Html(page(method, &results(&output)))),
        Err(e) => {
            let status = match PipelineError::find(&e) {
                Some(error) if error.is_input_error() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error!("{e:?}");
            (status, Html(page(method, &error_banner(&e))))
        }
    }
}

/// Returns the [`Request`] of a submitted form, the `file` field is required.
async fn read_form(mut multipart: Multipart) -> Result<Request, Report> {
    let mut upload = None;
    let mut method = Method::default();

    while let Some(field) = multipart.next_field().await.wrap_err("Failed to read form.")? {
        let name = field.name().map(String::from);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().map(String::from);
                let bytes = field.bytes().await.wrap_err("Failed to read uploaded file.")?;
                upload = Some(Upload::new(filename, bytes.to_vec()));
            }
            Some("method") => {
                let text = field.text().await.wrap_err("Failed to read tree method.")?;
                method = text
                    .parse()
                    .map_err(|_| eyre!("Unknown tree method: {text:?}"))
                    .wrap_err_with(|| eyre!("Expected one of: {}", Method::iter().join(", ")))?;
            }
            _ => (),
        }
    }

    let upload = upload.ok_or_else(|| eyre!("Form did not contain a file."))?;
    Ok(Request { upload, method })
}

// ----------------------------------------------------------------------------
// Pages
// ----------------------------------------------------------------------------

fn page(method: Method, content: &str) -> String {
    let body = formatdoc! {r#"
        <h1>{TITLE}</h1>
        {form}
        {content}"#,
        form = form(method),
    };
    render::document(TITLE, &body)
}

fn form(selected: Method) -> String {
    let options = Method::iter()
        .map(|method| {
            let selected = if method == selected { " selected" } else { "" };
            format!(r#"<option value="{method}"{selected}>{method}</option>"#)
        })
        .join("\n    ");

    formatdoc! {r#"
        <form action="/build" method="post" enctype="multipart/form-data">
          <p><label>Upload a FASTA file <input type="file" name="file" accept="{accept}" required></label></p>
          <p><label>Tree construction method <select name="method">
            {options}
          </select></label></p>
          <p><button type="submit">Build tree</button></p>
        </form>"#,
        accept = accept_attribute(),
    }
}

fn results(output: &Output) -> String {
    formatdoc! {r#"
        <h2>Aligned Sequences ({count})</h2>
        <pre class="alignment">{alignment}</pre>
        <h2>Phylogenetic Tree ({method})</h2>
        {tree}
        <details>
          <summary>Newick</summary>
          <pre class="newick">{newick}</pre>
        </details>
        {guide_tree}"#,
        guide_tree = match &output.guide_tree {
            Some(newick) => format!(
                r#"<details><summary>Guide tree</summary><pre class="guide-tree">{}</pre></details>"#,
                escape(newick)
            ),
            None => String::new(),
        },
        count = output.alignment.len(),
        alignment = escape(&output.alignment_fasta),
        method = output.method,
        tree = output.embed,
        newick = escape(&output.newick),
    }
}

fn error_banner(report: &Report) -> String {
    let causes = report.chain().map(|e| escape(&e.to_string())).join("<br>");
    format!(r#"<div class="error" role="alert">{causes}</div>"#)
}
