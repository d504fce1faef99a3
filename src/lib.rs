mod cancel;
pub mod compare;
pub mod docx;
mod error;
pub mod model;
pub mod verify;

pub use cancel::CancelToken;
pub use compare::{CompareOptions, MismatchRecord, Severity, Summary, compare, summarize};
pub use docx::ExtractOptions;
pub use error::Error;
pub use model::{
    DirectFormatPattern, FormattingContext, FormattingProperties, PropertyValue, StructuralRole,
    StyleRecord, StyleSet, StyleSignature, StyleType,
};

use std::path::Path;
use std::time::Instant;

fn document_id(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Extracts the style set of a DOCX file with default options.
pub fn extract_styles(input: &Path) -> Result<StyleSet, Error> {
    let options = ExtractOptions {
        document_id: document_id(input),
        ..Default::default()
    };
    docx::extract_file(input, &options)
}

/// Extracts both files and compares the document against the template.
pub fn compare_documents(
    template: &Path,
    document: &Path,
    options: &CompareOptions,
) -> Result<Vec<MismatchRecord>, Error> {
    let t0 = Instant::now();

    let extract = |path: &Path| {
        docx::extract_file(
            path,
            &ExtractOptions {
                document_id: document_id(path),
                include_style_definitions: true,
                cancel: options.cancel.clone(),
            },
        )
    };
    let template_styles = extract(template)?;
    let document_styles = extract(document)?;
    let t_extract = t0.elapsed();

    let mismatches = compare(&template_styles, &document_styles, options)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: extract={:.1}ms, compare={:.1}ms, total={:.1}ms ({} mismatches)",
        t_extract.as_secs_f64() * 1000.0,
        (t_total - t_extract).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        mismatches.len(),
    );

    Ok(mismatches)
}
