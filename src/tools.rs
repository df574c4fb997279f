//! Built-in tool catalog.
//!
//! These schemas describe the backend tools the client knows how to drive.
//! Callers can also build their own [`ToolSchema`] and hand it straight to a
//! [`crate::controller::ToolController`].

use crate::error::ToolflowError;
use crate::schema::{
    AutoDownload, Endpoint, FileField, FlagEncoding, OptionSpec, ToolSchema,
    DEFAULT_MAX_FILE_SIZE,
};
use once_cell::sync::Lazy;

static CATALOG: Lazy<Vec<ToolSchema>> = Lazy::new(|| {
    vec![
        pdf_merger(),
        pdf_splitter(),
        pdf_compressor(),
        pdf_to_word(),
        image_converter(),
        image_resizer(),
        image_compressor(),
        image_rotator(),
        qr_generator(),
    ]
});

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff"];

/// All built-in tools, in display order.
pub fn catalog() -> &'static [ToolSchema] {
    &CATALOG
}

/// Look up a built-in tool by its identifier.
pub fn lookup(id: &str) -> Result<&'static ToolSchema, ToolflowError> {
    CATALOG
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| ToolflowError::UnknownTool { id: id.to_string() })
}

fn pdf_tool(id: &str, name: &str) -> ToolSchema {
    ToolSchema {
        id: id.to_string(),
        name: name.to_string(),
        accepted_types: vec!["application/pdf".to_string()],
        accepted_extensions: vec!["pdf".to_string()],
        max_file_size: DEFAULT_MAX_FILE_SIZE,
        min_files: 1,
        max_files: 1,
        file_field: FileField::Named("file".to_string()),
        endpoint: Endpoint::SharedWithHeader,
        options: Vec::new(),
        auto_download: AutoDownload::Never,
        default_output_name: "processed_file".to_string(),
    }
}

fn image_tool(id: &str, name: &str) -> ToolSchema {
    ToolSchema {
        accepted_types: vec!["image/*".to_string()],
        accepted_extensions: IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        ..pdf_tool(id, name)
    }
}

pub fn pdf_merger() -> ToolSchema {
    ToolSchema {
        min_files: 2,
        max_files: 50,
        file_field: FileField::Named("files".to_string()),
        auto_download: AutoDownload::Always,
        default_output_name: "merged_document.pdf".to_string(),
        ..pdf_tool("pdf-merger", "PDF Merger")
    }
}

pub fn pdf_splitter() -> ToolSchema {
    ToolSchema {
        options: vec![
            OptionSpec::choice("split_type", "Split mode", &["all", "range", "every"], "all"),
            OptionSpec::integer("start_page", "First page", 1, 10_000, 1)
                .visible_when("split_type", "range"),
            OptionSpec::integer("end_page", "Last page", 1, 10_000, 1)
                .visible_when("split_type", "range"),
            OptionSpec::integer("every_n", "Pages per part", 1, 1000, 1)
                .visible_when("split_type", "every"),
        ],
        auto_download: AutoDownload::WhenSingleOutput,
        default_output_name: "split_document.pdf".to_string(),
        ..pdf_tool("pdf-splitter", "PDF Splitter")
    }
}

pub fn pdf_compressor() -> ToolSchema {
    ToolSchema {
        options: vec![
            OptionSpec::choice(
                "compression_level",
                "Compression level",
                &["low", "medium", "high"],
                "medium",
            ),
            OptionSpec::integer("quality", "Image quality", 10, 100, 85),
        ],
        auto_download: AutoDownload::Always,
        default_output_name: "compressed_document.pdf".to_string(),
        ..pdf_tool("pdf-compressor", "PDF Compressor")
    }
}

pub fn pdf_to_word() -> ToolSchema {
    ToolSchema {
        endpoint: Endpoint::Custom("/process_tool/pdf-to-word".to_string()),
        options: vec![
            OptionSpec::flag("ocr_enabled", "OCR", false, FlagEncoding::TrueFalse),
            OptionSpec::choice(
                "language",
                "OCR language",
                &["eng", "spa", "fra", "deu", "hin"],
                "eng",
            ),
            OptionSpec::flag("preserve_layout", "Preserve layout", true, FlagEncoding::TrueFalse),
            OptionSpec::flag("extract_images", "Extract images", true, FlagEncoding::TrueFalse),
        ],
        default_output_name: "converted_document.docx".to_string(),
        ..pdf_tool("pdf-to-word", "PDF to Word")
    }
}

pub fn image_converter() -> ToolSchema {
    ToolSchema {
        max_files: 20,
        file_field: FileField::Indexed("file_".to_string()),
        endpoint: Endpoint::SharedWithField,
        options: vec![
            OptionSpec::choice("quality", "Quality", &["low", "medium", "high"], "high"),
            OptionSpec::choice(
                "format",
                "Output format",
                &["png", "jpeg", "webp", "gif", "bmp"],
                "png",
            ),
        ],
        default_output_name: "converted_images.zip".to_string(),
        ..image_tool("image-converter", "Image Converter")
    }
}

pub fn image_resizer() -> ToolSchema {
    ToolSchema {
        endpoint: Endpoint::PerTool,
        options: vec![
            OptionSpec::integer("width", "Width (px)", 10, 5000, 800),
            OptionSpec::integer("height", "Height (px)", 10, 5000, 600),
            OptionSpec::flag(
                "maintainAspect",
                "Keep aspect ratio",
                true,
                FlagEncoding::OnOrAbsent,
            ),
            OptionSpec::integer("quality", "Quality", 10, 100, 85),
        ],
        default_output_name: "resized_image".to_string(),
        ..image_tool("image-resize", "Image Resizer")
    }
}

pub fn image_compressor() -> ToolSchema {
    ToolSchema {
        endpoint: Endpoint::PerTool,
        options: vec![OptionSpec::integer("quality", "Quality", 10, 100, 85)],
        default_output_name: "compressed_image".to_string(),
        ..image_tool("image-compress", "Image Compressor")
    }
}

pub fn image_rotator() -> ToolSchema {
    ToolSchema {
        endpoint: Endpoint::PerTool,
        options: vec![OptionSpec::integer("angle", "Angle (degrees)", -360, 360, 90)],
        default_output_name: "rotated_image".to_string(),
        ..image_tool("image-rotate", "Image Rotator")
    }
}

pub fn qr_generator() -> ToolSchema {
    ToolSchema {
        id: "qr-generator".to_string(),
        name: "QR Code Generator".to_string(),
        accepted_types: Vec::new(),
        accepted_extensions: Vec::new(),
        max_file_size: 0,
        min_files: 0,
        max_files: 0,
        file_field: FileField::Named("file".to_string()),
        endpoint: Endpoint::Api,
        options: vec![
            OptionSpec::text("content", "Content", None, true),
            OptionSpec::integer("size", "Size (px)", 100, 1000, 200),
            OptionSpec::color("color", "Foreground", "#000000"),
            OptionSpec::color("bg_color", "Background", "#ffffff"),
            OptionSpec::choice("format", "Format", &["PNG", "SVG", "JPEG"], "PNG"),
        ],
        auto_download: AutoDownload::Never,
        default_output_name: "qr_code.png".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OptionKind;

    #[test]
    fn catalog_ids_are_unique() {
        let mut ids: Vec<&str> = catalog().iter().map(|t| t.id.as_str()).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn lookup_unknown_tool() {
        assert!(matches!(
            lookup("pdf-shredder"),
            Err(ToolflowError::UnknownTool { .. })
        ));
        assert_eq!(lookup("pdf-merger").unwrap().min_files, 2);
    }

    #[test]
    fn every_option_default_is_within_bounds() {
        for tool in catalog() {
            for opt in &tool.options {
                match &opt.kind {
                    OptionKind::Integer { min, max, default } => {
                        assert!(min <= default && default <= max, "{}.{}", tool.id, opt.name)
                    }
                    OptionKind::Choice { values, default } => {
                        assert!(values.contains(default), "{}.{}", tool.id, opt.name)
                    }
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn file_tools_have_a_size_ceiling() {
        for tool in catalog().iter().filter(|t| t.takes_files()) {
            assert_eq!(tool.max_file_size, DEFAULT_MAX_FILE_SIZE, "{}", tool.id);
            assert!(tool.min_files <= tool.max_files, "{}", tool.id);
        }
    }

    #[test]
    fn per_tool_image_endpoints() {
        for (tool, path) in [
            (image_resizer(), "/process/image-resize"),
            (image_compressor(), "/process/image-compress"),
            (image_rotator(), "/process/image-rotate"),
        ] {
            assert_eq!(tool.endpoint.path(&tool.id), path);
        }
        assert_eq!(lookup("image-rotate").unwrap().name, "Image Rotator");
    }

    #[test]
    fn image_tools_accept_wildcard_images() {
        let tool = image_converter();
        assert!(tool.accepts(Some("image/webp"), None));
        assert!(tool.accepts(None, Some("JPG")));
        assert!(!tool.accepts(Some("application/pdf"), Some("pdf")));
    }
}
