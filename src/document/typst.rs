//! Typst rendering backend.
//!
//! Handles the low-level details of writing Typst source to a temporary
//! directory, measuring the body with `typst query`, compiling the PDF and
//! applying password protection with `qpdf`.

use serde::Deserialize;
use std::fs;
use std::process::Command;
use tempfile::{tempdir, TempDir};
use uuid::Uuid;

use super::common::{mm, sanitize_filename, typst_str};
use super::options::{ComplianceEmbedding, Protection};
use super::render::{RenderBackend, RenderError, RenderSession};
use crate::config::RenderTools;
use crate::qrbill::layout::{PanelSection, Rect, PAGE_MARGIN_TOP_MM, PAGE_MARGIN_X_MM};
use crate::qrbill::{qr_code, PlacedSlip};

const SOURCE_FILE: &str = "main.typ";
const OUTPUT_FILE: &str = "output.pdf";
const PROTECTED_FILE: &str = "protected.pdf";
const QPDF_ARGS_FILE: &str = "qpdf.args";
const QR_FILE: &str = "qr.svg";
const ATTACHMENT_DIR: &str = "attachments";
const METADATA_FILE: &str = "invoice-metadata.xml";
const BODY_END_LABEL: &str = "body-end";
const SLIP_PAGE_LABEL: &str = "slip-page";
const ARCHIVAL_STANDARD: &str = "a-3b";

/// qpdf exits with 3 when it succeeded with warnings.
const QPDF_ACCEPTED_CODES: &[i32] = &[0, 3];

/// Stateless factory for Typst render sessions.
#[derive(Debug, Clone)]
pub struct TypstBackend {
    tools: RenderTools,
}

impl TypstBackend {
    pub fn new(tools: RenderTools) -> Self {
        Self { tools }
    }
}

impl RenderBackend for TypstBackend {
    fn begin(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        // Create temp directory for compilation context
        let dir = tempdir().map_err(RenderError::TempDir)?;
        Ok(Box::new(TypstSession {
            dir,
            tools: self.tools.clone(),
            embeds: Vec::new(),
            archival: false,
            protection: None,
            footer: None,
            watermark: None,
            body: String::new(),
            trailer: String::new(),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct BodyEnd {
    page: u32,
    y: f64,
}

/// One Typst document under construction.
pub struct TypstSession {
    dir: TempDir,
    tools: RenderTools,
    embeds: Vec<String>,
    archival: bool,
    protection: Option<Protection>,
    footer: Option<String>,
    watermark: Option<String>,
    body: String,
    /// Page break and slip drawing, appended after the body
    trailer: String,
}

fn execute(command: &mut Command, tool: &str, accepted: &[i32]) -> Result<Vec<u8>, RenderError> {
    log::debug!("running {:?}", command);
    let output = command.output().map_err(|source| RenderError::ToolIo {
        tool: tool.to_string(),
        source,
    })?;

    let code = output.status.code().unwrap_or(-1);
    if !accepted.contains(&code) {
        return Err(RenderError::ToolExit {
            tool: tool.to_string(),
            code,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output.stdout)
}

/// Per-document owner password, 64 hex digits.
fn random_owner_password() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Place `body` at absolute page coordinates.
fn place(x: f64, y: f64, body: &str) -> String {
    format!(
        "#place(top + left, dx: {}, dy: {}, {})\n",
        mm(x - PAGE_MARGIN_X_MM),
        mm(y - PAGE_MARGIN_TOP_MM),
        body
    )
}

fn place_block(rect: &Rect, content: &str) -> String {
    place(
        rect.x,
        rect.y,
        &format!(
            "block(width: {}, height: {}, {{\n{}\n}})",
            mm(rect.width),
            mm(rect.height),
            content
        ),
    )
}

fn heading(text: &str, size_pt: f64) -> String {
    format!("text(size: {}pt, weight: \"bold\", {})", size_pt, typst_str(text))
}

fn value(text: &str, size_pt: f64) -> String {
    format!("text(size: {}pt, {})", size_pt, typst_str(text))
}

fn sections(sections: &[PanelSection], heading_pt: f64, value_pt: f64) -> String {
    let mut parts = Vec::new();
    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            parts.push(format!("v({}pt)", value_pt));
        }
        parts.push(heading(&section.heading, heading_pt));
        for line in &section.lines {
            parts.push("linebreak()".to_string());
            parts.push(value(line, value_pt));
        }
    }
    parts.join("\n")
}

fn amount_grid(slip: &PlacedSlip, heading_pt: f64, value_pt: f64) -> String {
    format!(
        "grid(columns: (15mm, 1fr), row-gutter: 1mm, {}, {}, {}, {})",
        heading(&slip.text.currency_heading, heading_pt),
        heading(&slip.text.amount_heading, heading_pt),
        value(&slip.text.currency, value_pt),
        value(&slip.text.amount, value_pt),
    )
}

fn swiss_cross(rect: &Rect) -> String {
    let arm_long = rect.width * 0.6;
    let arm_short = rect.width * 0.2;
    let long_offset = (rect.width - arm_long) / 2.0;
    let short_offset = (rect.width - arm_short) / 2.0;

    let mut out = place(
        rect.x,
        rect.y,
        &format!(
            "rect(width: {}, height: {}, fill: black, stroke: 0.8pt + white)",
            mm(rect.width),
            mm(rect.height)
        ),
    );
    out.push_str(&place(
        rect.x + long_offset,
        rect.y + short_offset,
        &format!("rect(width: {}, height: {}, fill: white)", mm(arm_long), mm(arm_short)),
    ));
    out.push_str(&place(
        rect.x + short_offset,
        rect.y + long_offset,
        &format!("rect(width: {}, height: {}, fill: white)", mm(arm_short), mm(arm_long)),
    ));
    out
}

impl TypstSession {
    fn write_input(&self, name: &str, contents: impl AsRef<[u8]>) -> Result<(), RenderError> {
        let path = self.dir.path().join(name);
        let write_error = |source| RenderError::WriteInput {
            name: name.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        fs::write(&path, contents).map_err(write_error)
    }

    fn page_setup(&self) -> String {
        let mut page = format!(
            "#set page(paper: \"a4\", margin: (top: {}, bottom: {}, x: {})",
            mm(PAGE_MARGIN_TOP_MM),
            mm(PAGE_MARGIN_TOP_MM),
            mm(PAGE_MARGIN_X_MM)
        );

        if let Some(footer) = &self.footer {
            // the slip covers the bottom margin of its page
            page.push_str(&format!(
                ", footer: context if query(<{}>).any(it => it.location().page() == here().page()) {{ none }} else {{ eval({}, mode: \"markup\") }}",
                SLIP_PAGE_LABEL,
                typst_str(footer)
            ));
        }

        if let Some(text) = &self.watermark {
            page.push_str(&format!(
                ", background: rotate(-45deg, text(size: 72pt, fill: luma(220), {}))",
                typst_str(text)
            ));
        }

        page.push_str(")\n");
        page
    }

    fn source(&self, measure: bool) -> String {
        let mut source = self.page_setup();
        source.push_str("#set text(size: 10pt)\n");
        for embed in &self.embeds {
            source.push_str(embed);
            source.push('\n');
        }
        source.push_str(&self.body);
        // paragraph break, so nothing after the body shares its last line
        source.push_str("\n\n");

        if measure {
            source.push_str(&format!(
                "#context [#metadata((page: here().page(), y: here().position().y.mm())) <{}>]\n",
                BODY_END_LABEL
            ));
        } else {
            source.push_str(&self.trailer);
        }
        source
    }

    fn embed_file(
        &mut self,
        name: &str,
        contents: &[u8],
        mime_type: &str,
        relationship: &str,
        description: Option<&str>,
    ) -> Result<(), RenderError> {
        let path = format!("{}/{}", ATTACHMENT_DIR, name);
        self.write_input(&path, contents)?;

        let mut directive = format!(
            "#pdf.embed({}, relationship: {}, mime-type: {}",
            typst_str(&path),
            typst_str(relationship),
            typst_str(mime_type)
        );
        if let Some(description) = description {
            directive.push_str(&format!(", description: {}", typst_str(description)));
        }
        directive.push(')');

        self.embeds.push(directive);
        Ok(())
    }

    fn qpdf_args(&self, protection: &Protection) -> Vec<String> {
        // never the user password, or opening the document grants full access
        let owner = match &self.tools.owner_password {
            Some(owner) if *owner != protection.password => owner.clone(),
            _ => random_owner_password(),
        };

        vec![
            "--encrypt".to_string(),
            protection.password.clone(),
            owner,
            "256".to_string(),
            format!("--print={}", if protection.allow_print { "full" } else { "none" }),
            format!("--extract={}", if protection.allow_copy { "y" } else { "n" }),
            "--modify=none".to_string(),
            "--".to_string(),
            OUTPUT_FILE.to_string(),
            PROTECTED_FILE.to_string(),
        ]
    }

    fn encrypt(&self, protection: &Protection) -> Result<(), RenderError> {
        // passwords go through an argument file, not the process list
        self.write_input(QPDF_ARGS_FILE, self.qpdf_args(protection).join("\n"))?;

        let mut qpdf = Command::new(&self.tools.qpdf_bin);
        qpdf.arg(format!("@{}", QPDF_ARGS_FILE))
            .current_dir(self.dir.path());
        execute(&mut qpdf, "qpdf", QPDF_ACCEPTED_CODES)?;
        Ok(())
    }
}

impl RenderSession for TypstSession {
    fn mark_archival(&mut self, embedding: &ComplianceEmbedding) -> Result<(), RenderError> {
        if !self.body.is_empty() {
            return Err(RenderError::Backend(
                "archival marking must happen before content is written".to_string(),
            ));
        }

        self.archival = true;
        self.embed_file(
            METADATA_FILE,
            embedding.metadata.as_bytes(),
            "application/xml",
            "data",
            Some("Electronic invoice metadata"),
        )?;

        for attachment in &embedding.attachments {
            let name = sanitize_filename(&attachment.filename, "attachment");
            self.embed_file(
                &name,
                &attachment.data,
                &attachment.mime_type,
                attachment.relationship.as_str(),
                attachment.description.as_deref(),
            )?;
        }
        Ok(())
    }

    fn protect(&mut self, protection: &Protection) -> Result<(), RenderError> {
        self.protection = Some(protection.clone());
        Ok(())
    }

    fn set_footer(&mut self, markup: &str) {
        self.footer = Some(markup.to_string());
    }

    fn set_watermark(&mut self, text: &str) {
        self.watermark = Some(text.to_string());
    }

    fn write_markup(&mut self, markup: &str) -> Result<(), RenderError> {
        self.body.push_str(markup);
        Ok(())
    }

    fn content_height_mm(&mut self) -> Result<f64, RenderError> {
        self.write_input(SOURCE_FILE, self.source(true))?;

        let selector = format!("<{}>", BODY_END_LABEL);
        let mut query = Command::new(&self.tools.typst_bin);
        query
            .arg("query")
            .arg("--root")
            .arg(self.dir.path())
            .arg(SOURCE_FILE)
            .arg(&selector)
            .arg("--field")
            .arg("value")
            .arg("--one")
            .current_dir(self.dir.path());
        let stdout = execute(&mut query, "typst", &[0])?;

        let end: BodyEnd =
            serde_json::from_slice(&stdout).map_err(|e| RenderError::Measure(e.to_string()))?;
        let height = (end.y - PAGE_MARGIN_TOP_MM).max(0.0);
        log::debug!("body ends on page {} at {:.1} mm", end.page, height);
        Ok(height)
    }

    fn add_page(&mut self) {
        self.trailer.push_str("#pagebreak()\n");
    }

    fn draw_slip(&mut self, slip: &PlacedSlip) -> Result<(), RenderError> {
        let svg = qr_code::render_svg(&slip.qr_payload)
            .map_err(|e| RenderError::QrCode(e.to_string()))?;
        self.write_input(QR_FILE, svg)?;

        let g = &slip.geometry;
        let fonts = &g.fonts;
        let separator = "stroke: (thickness: 0.2pt, dash: \"dashed\")";

        let mut out = format!("#metadata(none) <{}>\n", SLIP_PAGE_LABEL);
        out.push_str(&place(
            g.panel.x,
            g.panel.y,
            &format!("line(length: {}, {})", mm(g.panel.width), separator),
        ));
        out.push_str(&place(
            g.receipt.right(),
            g.panel.y,
            &format!("line(angle: 90deg, length: {}, {})", mm(g.panel.height), separator),
        ));

        out.push_str(&place_block(&g.receipt_title, &heading(&slip.text.receipt_title, fonts.title_pt)));
        out.push_str(&place_block(
            &g.receipt_information,
            &sections(&slip.text.receipt_sections, fonts.receipt_heading_pt, fonts.receipt_value_pt),
        ));
        out.push_str(&place_block(
            &g.receipt_amount,
            &amount_grid(slip, fonts.receipt_heading_pt, fonts.receipt_value_pt),
        ));
        out.push_str(&place_block(
            &g.receipt_acceptance,
            &format!(
                "align(right, {})",
                heading(&slip.text.acceptance_point, fonts.receipt_heading_pt)
            ),
        ));

        out.push_str(&place_block(&g.payment_title, &heading(&slip.text.payment_title, fonts.title_pt)));
        out.push_str(&place(
            g.qr_code.x,
            g.qr_code.y,
            &format!(
                "image({}, width: {}, height: {})",
                typst_str(QR_FILE),
                mm(g.qr_code.width),
                mm(g.qr_code.height)
            ),
        ));
        out.push_str(&swiss_cross(&g.swiss_cross));
        out.push_str(&place_block(
            &g.payment_amount,
            &amount_grid(slip, fonts.payment_heading_pt, fonts.payment_value_pt),
        ));
        out.push_str(&place_block(
            &g.payment_information,
            &sections(&slip.text.payment_sections, fonts.payment_heading_pt, fonts.payment_value_pt),
        ));

        self.trailer.push_str(&out);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, RenderError> {
        self.write_input(SOURCE_FILE, self.source(false))?;

        let mut compile = Command::new(&self.tools.typst_bin);
        compile.arg("compile").arg("--root").arg(self.dir.path());
        if self.archival {
            compile.arg("--pdf-standard").arg(ARCHIVAL_STANDARD);
        }
        compile
            .arg(SOURCE_FILE)
            .arg(OUTPUT_FILE)
            .current_dir(self.dir.path());
        execute(&mut compile, "typst", &[0])?;

        let output = match &self.protection {
            Some(protection) => {
                self.encrypt(protection)?;
                PROTECTED_FILE
            }
            None => OUTPUT_FILE,
        };

        fs::read(self.dir.path().join(output)).map_err(RenderError::ReadPdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> TypstSession {
        TypstSession {
            dir: tempdir().unwrap(),
            tools: RenderTools {
                typst_bin: "typst".to_string(),
                qpdf_bin: "qpdf".to_string(),
                owner_password: None,
            },
            embeds: Vec::new(),
            archival: false,
            protection: None,
            footer: None,
            watermark: None,
            body: String::new(),
            trailer: String::new(),
        }
    }

    #[test]
    fn test_place_is_relative_to_margins() {
        assert_eq!(
            place(15.0, 192.0, "x"),
            "#place(top + left, dx: 0.00mm, dy: 180.00mm, x)\n"
        );
    }

    #[test]
    fn test_measure_source_ends_with_marker() {
        let mut s = session();
        s.write_markup("= Invoice").unwrap();
        s.add_page();

        let measured = s.source(true);
        assert!(measured.contains("= Invoice"));
        assert!(measured.trim_end().ends_with("<body-end>]"));
        assert!(!measured.contains("#pagebreak()"));

        let final_source = s.source(false);
        assert!(final_source.contains("#pagebreak()"));
        assert!(!final_source.contains("<body-end>"));
    }

    #[test]
    fn test_page_setup_with_footer_and_watermark() {
        let mut s = session();
        s.set_footer("Thank you");
        s.set_watermark("COPY");

        let setup = s.page_setup();
        assert!(setup.contains("eval(\"Thank you\", mode: \"markup\")"));
        assert!(setup.contains("\"COPY\""));
    }

    #[test]
    fn test_footer_brackets_stay_inside_string() {
        let mut s = session();
        s.set_footer("Pay within 30 days] #panic(\"x\") [");

        let setup = s.page_setup();
        assert!(!setup.contains("else ["));
        assert!(setup.contains(&typst_str("Pay within 30 days] #panic(\"x\") [")));
        assert!(setup.ends_with(")\n"));
    }

    #[test]
    fn test_body_end_marker_is_own_paragraph() {
        let mut s = session();
        s.write_markup("Total: CHF 1949.75").unwrap();

        let measured = s.source(true);
        assert!(measured.contains("Total: CHF 1949.75\n\n#context"));

        s.add_page();
        let final_source = s.source(false);
        assert!(final_source.contains("Total: CHF 1949.75\n\n#pagebreak()"));
    }

    #[test]
    fn test_owner_password_differs_from_user_password() {
        let s = session();
        let protection = Protection {
            password: "secret".to_string(),
            allow_print: true,
            allow_copy: false,
        };

        let args = s.qpdf_args(&protection);
        assert_eq!(args[1], "secret");
        assert_ne!(args[2], "secret");
        assert_eq!(args[2].len(), 64);
        assert_ne!(args[2], s.qpdf_args(&protection)[2]);
    }

    #[test]
    fn test_configured_owner_password_is_used() {
        let mut s = session();
        s.tools.owner_password = Some("owner-secret".to_string());
        let protection = Protection {
            password: "secret".to_string(),
            allow_print: false,
            allow_copy: false,
        };

        let args = s.qpdf_args(&protection);
        assert_eq!(args[2], "owner-secret");
        assert_eq!(args[4], "--print=none");
    }

    #[test]
    fn test_archival_embeds_before_body() {
        let mut s = session();
        let embedding = ComplianceEmbedding {
            metadata: "<rdf/>".to_string(),
            attachments: vec![],
        };
        s.mark_archival(&embedding).unwrap();
        s.write_markup("Body").unwrap();

        let source = s.source(false);
        let embed_at = source.find("#pdf.embed").unwrap();
        assert!(embed_at < source.find("Body").unwrap());
        assert!(s.dir.path().join(ATTACHMENT_DIR).join(METADATA_FILE).exists());

        assert!(s.mark_archival(&embedding).is_err());
    }
}
