//! Streaming conversion API: emit pages as they complete.
//!
//! A 30-page paper through the vision engine takes minutes. [`convert_stream`]
//! yields each [`PageResult`] as soon as its VLM call returns, so callers can
//! show partial output or write pages incrementally.
//!
//! Pages always arrive in page order; the vision engine transcribes one page
//! at a time. The text engines finish in milliseconds, so their stream is
//! computed up front. Streaming never writes files or inserts figure links;
//! use [`crate::convert::convert_to_dir`] for that.

use crate::config::{ConversionConfig, Engine};
use crate::convert::{text_pages, vision_provider};
use crate::error::Paper2MdError;
use crate::output::PageResult;
use crate::pipeline::{encode, extract, figures, input, llm, postprocess, render};
use edgequake_llm::LLMProvider;
use futures::stream;
use image::DynamicImage;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageResult, Paper2MdError>> + Send>>;

/// Convert a PDF to Markdown, streaming pages as they are ready.
///
/// # Returns
/// - `Ok(PageStream)`: the first `Err` item ends the stream
/// - `Err(Paper2MdError)`: the document could not be opened or no provider
///   is configured
pub async fn convert_stream(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<PageStream, Paper2MdError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming conversion: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();
    let provider = vision_provider(config)?;

    let metadata = extract::extract_metadata(&pdf_path, config.password.as_deref()).await?;
    let total_pages = metadata.page_count;

    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(Paper2MdError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }

    match (config.engine, provider) {
        (Engine::Vision, Some(provider)) => {
            // Rendering is done before returning, so the downloaded temp file
            // may be dropped with `resolved`.
            let rendered = render::render_pages(&pdf_path, config, &page_indices).await?;
            Ok(vision_stream(rendered, provider, config.clone()))
        }
        _ => {
            let texts =
                extract::extract_page_texts(&pdf_path, config.password.as_deref(), &page_indices)
                    .await?;
            let (pages, _body) = text_pages(texts, config);
            Ok(Box::pin(stream::iter(pages.into_iter().map(Ok))))
        }
    }
}

struct VisionState {
    pending: VecDeque<(usize, DynamicImage)>,
    provider: Arc<dyn LLMProvider>,
    config: ConversionConfig,
    prior: Option<String>,
    total: usize,
    failed: bool,
}

fn vision_stream(
    rendered: Vec<(usize, DynamicImage)>,
    provider: Arc<dyn LLMProvider>,
    config: ConversionConfig,
) -> PageStream {
    let state = VisionState {
        total: rendered.len(),
        pending: rendered.into(),
        provider,
        config,
        prior: None,
        failed: false,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        if st.failed {
            return None;
        }
        let (idx, image) = st.pending.pop_front()?;
        let result = transcribe(&mut st, idx, image).await;
        st.failed = result.is_err();
        Some((result, st))
    }))
}

async fn transcribe(
    st: &mut VisionState,
    idx: usize,
    image: DynamicImage,
) -> Result<PageResult, Paper2MdError> {
    let page_num = idx + 1;
    if let Some(ref cb) = st.config.progress_callback {
        cb.on_page_start(page_num, st.total);
    }

    let png = encode::png_bytes(&image).map_err(|e| Paper2MdError::RasterisationFailed {
        page: page_num,
        detail: format!("PNG encoding failed: {e}"),
    })?;
    drop(image);

    let mut page = llm::process_page(
        &st.provider,
        page_num,
        encode::to_image_data(&png),
        st.prior.as_deref(),
        &st.config,
    )
    .await?;

    page.markdown = postprocess::clean_markdown(&page.markdown);
    page.has_figure = figures::has_figure_caption(&page.markdown);
    st.prior = Some(page.markdown.clone());

    if let Some(ref cb) = st.config.progress_callback {
        cb.on_page_complete(page_num, st.total, page.markdown.len());
    }
    Ok(page)
}
