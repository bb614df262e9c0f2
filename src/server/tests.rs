use super::*;
use crate::align::{ClustalOmega, Prealigned};
use axum::body::Body;
use axum::http::{header, Request as HttpRequest};
use color_eyre::eyre::{Report, Result};
use tower::ServiceExt;

const BOUNDARY: &str = "treebuilder-test-boundary";
const SEQUENCES: &str = ">alpha\nACGTACGT\n>beta\nACGTACGA\n>gamma\nTCGTACCA\n>delta\nTCGAACCA\n";

fn app(aligner: Box<dyn Aligner>) -> Router {
    let state = Arc::new(AppState { aligner, style: RenderStyle::default() });
    router(state, Args::default().max_upload_bytes())
}

/// Returns a multipart form body with the given `(name, filename, value)` fields.
fn multipart_body(fields: &[(&str, Option<&str>, &str)]) -> String {
    let mut body = String::new();
    for (name, filename, value) in fields {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        match filename {
            Some(filename) => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )),
            None => body.push_str(&format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")),
        }
        body.push_str(value);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

async fn post_build(app: Router, fields: &[(&str, Option<&str>, &str)]) -> Result<(StatusCode, String), Report> {
    let request = HttpRequest::builder()
        .method("POST")
        .uri("/build")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(fields)))?;
    let response = app.oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, String::from_utf8(bytes.to_vec())?))
}

#[tokio::test]
async fn index_has_upload_form() -> Result<(), Report> {
    let request = HttpRequest::builder().uri("/").body(Body::empty())?;
    let response = app(Box::new(Prealigned)).oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let html = String::from_utf8(bytes.to_vec())?;
    assert!(html.contains(r#"accept=".fasta,.fa""#));
    assert_eq!(html.matches("<option").count(), 2);
    assert!(html.contains(r#"<option value="Neighbor-Joining" selected>Neighbor-Joining</option>"#));
    assert!(html.contains(r#"<option value="UPGMA">UPGMA</option>"#));
    Ok(())
}

#[tokio::test]
async fn health_reports_ok() -> Result<(), Report> {
    let request = HttpRequest::builder().uri("/health").body(Body::empty())?;
    let response = app(Box::new(Prealigned)).oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let health: Health = serde_json::from_slice(&bytes)?;
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    Ok(())
}

#[tokio::test]
async fn build_renders_alignment_then_tree() -> Result<(), Report> {
    let fields = [("method", None, "UPGMA"), ("file", Some("seqs.fasta"), SEQUENCES)];
    let (status, html) = post_build(app(Box::new(Prealigned)), &fields).await?;
    assert_eq!(status, StatusCode::OK, "{html}");

    let alignment = html.find(r#"<pre class="alignment">"#).unwrap();
    let tree = html.find(r#"<div class="tree""#).unwrap();
    assert!(alignment < tree);
    assert!(html.contains("Phylogenetic Tree (UPGMA)"));
    assert_eq!(html.matches(r#"class="leaf-name""#).count(), 4);
    assert!(html.contains(r#"<option value="UPGMA" selected>"#));
    Ok(())
}

#[tokio::test]
async fn build_defaults_to_neighbor_joining() -> Result<(), Report> {
    let fields = [("file", Some("seqs.fa"), SEQUENCES)];
    let (status, html) = post_build(app(Box::new(Prealigned)), &fields).await?;
    assert_eq!(status, StatusCode::OK, "{html}");
    assert!(html.contains("Phylogenetic Tree (Neighbor-Joining)"));
    Ok(())
}

#[tokio::test]
async fn empty_upload_is_bad_request() -> Result<(), Report> {
    let fields = [("method", None, "UPGMA"), ("file", Some("empty.fasta"), "")];
    let (status, html) = post_build(app(Box::new(Prealigned)), &fields).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(html.contains(r#"class="error""#));
    assert!(!html.contains("leaf-name"));
    Ok(())
}

#[tokio::test]
async fn unknown_method_is_bad_request() -> Result<(), Report> {
    let fields = [("method", None, "Maximum-Likelihood"), ("file", Some("seqs.fasta"), SEQUENCES)];
    let (status, html) = post_build(app(Box::new(Prealigned)), &fields).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(html.contains("Unknown tree method"));
    Ok(())
}

#[tokio::test]
async fn missing_aligner_is_server_error() -> Result<(), Report> {
    let aligner = ClustalOmega::new("treebuilder-test-no-such-aligner");
    let fields = [("file", Some("seqs.fasta"), SEQUENCES)];
    let (status, html) = post_build(app(Box::new(aligner)), &fields).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(html.contains("Alignment tool not found"));
    assert!(!html.contains("leaf-name"));
    Ok(())
}

#[test]
fn args_default() {
    let args = Args::parse_from(["serve"]);
    assert_eq!(args, Args::default());
    assert_eq!(args.address.to_string(), "127.0.0.1:8501");
    assert!(args.style.show_leaf_names);

    let args = Args::parse_from(["serve", "--aligner", "prealigned", "--no-leaf-names", "--height", "400"]);
    assert_eq!(args.aligner.aligner, crate::align::AlignerKind::Prealigned);
    assert!(!args.style.show_leaf_names);
    assert_eq!(args.style.height, 400);
}

#[test]
fn huge_upload_limit_saturates() {
    let max = usize::MAX.to_string();
    let args = Args::parse_from(["serve", "--max-upload-mb", max.as_str()]);
    assert_eq!(args.max_upload_bytes(), usize::MAX);
}

#[cfg(unix)]
#[tokio::test]
async fn failed_aligner_is_server_error() -> Result<(), Report> {
    let fields = [("file", Some("seqs.fasta"), SEQUENCES)];
    for (program, message) in [("false", "failed (exit code 1)"), ("true", "did not write its output")] {
        let (status, html) = post_build(app(Box::new(ClustalOmega::new(program))), &fields).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{program}");
        assert!(html.contains(message), "{program}: {html}");
        assert!(!html.contains("leaf-name"), "{program}");
    }
    Ok(())
}
