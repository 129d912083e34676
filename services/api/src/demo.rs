use crate::infra::{offline_collaborators, InMemorySessionRepository};
use chrono::{Local, NaiveDate};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use usmca_origin::error::AppError;
use usmca_origin::workflows::certificate::{
    Authorization, Classification, CompanyInfo, JsonFileArchive, OriginWorkflowService,
    PartyInfo, SessionView, TextCertificateRenderer, WorkflowAction, WorkflowCollaborators,
    WorkflowSettings, validate_all,
};
use usmca_origin::workflows::origin::{
    BomImporter, ComponentOrigin, HsCode, RegionalContentCalculator, RegionalContentResult,
    TradeBloc, DEFAULT_THRESHOLD,
};
use usmca_origin::workflows::qualification::{RuleSelection, Rulebook};

#[derive(Args, Debug)]
pub(crate) struct RvcArgs {
    /// Bill of materials CSV (Origin Country, Value Percentage, Description)
    #[arg(long)]
    pub(crate) bom: PathBuf,
    /// HS code used to pick the product rule threshold
    #[arg(long)]
    pub(crate) hs_code: Option<String>,
    /// Country of final manufacturing (ISO alpha-2)
    #[arg(long)]
    pub(crate) manufactured_in: Option<String>,
    /// Explicit threshold percentage; overrides the product rule
    #[arg(long, value_parser = crate::infra::parse_threshold)]
    pub(crate) threshold: Option<f64>,
    /// Print the result as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// HS code of the sample product. Defaults to 8708.30 (brake assemblies).
    #[arg(long)]
    pub(crate) hs_code: Option<String>,
    /// Country of final manufacturing. Defaults to MX.
    #[arg(long)]
    pub(crate) manufactured_in: Option<String>,
    /// Optional bill of materials CSV replacing the sample components.
    #[arg(long)]
    pub(crate) bom: Option<PathBuf>,
    /// Signature date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) signature_date: Option<NaiveDate>,
    /// Directory for the saved session archive. Defaults to the system temp directory.
    #[arg(long)]
    pub(crate) archive_dir: Option<PathBuf>,
    /// Skip saving the finished session.
    #[arg(long)]
    pub(crate) skip_save: bool,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn run_rvc_check(args: RvcArgs) -> Result<(), AppError> {
    let RvcArgs {
        bom,
        hs_code,
        manufactured_in,
        threshold,
        json,
    } = args;

    let components = BomImporter::from_path(&bom)?;
    let bloc = TradeBloc::usmca();
    let rulebook = Rulebook::standard();

    let selection = match hs_code.as_deref() {
        Some(raw) => {
            let hs_code = HsCode::parse(raw)?;
            let location = manufactured_in.as_deref().unwrap_or("MX");
            Some(rulebook.select(&hs_code, location, &bloc))
        }
        None => None,
    };
    let threshold_required = threshold
        .or_else(|| selection.as_ref().map(|rule| rule.threshold_required))
        .unwrap_or(DEFAULT_THRESHOLD);

    let result =
        RegionalContentCalculator::new(bloc).calculate(components.components(), threshold_required);

    if json {
        let payload = serde_json::json!({
            "bom": bom.display().to_string(),
            "result": result,
            "rule": selection.as_ref().map(|rule| serde_json::json!({
                "rule_key": rule.rule_key,
                "rule_description": rule.rule_description,
                "manufactured_in_bloc": rule.manufactured_in_bloc,
            })),
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => println!("RVC payload unavailable: {err}"),
        }
        return Ok(());
    }

    println!("Regional value content check");
    println!("Bill of materials: {}", bom.display());
    render_components(components.components());
    render_result(&result, selection.as_ref());
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        hs_code,
        manufactured_in,
        bom,
        signature_date,
        archive_dir,
        skip_save,
    } = args;

    let hs_code = HsCode::parse(hs_code.as_deref().unwrap_or("8708.30"))?;
    let manufactured_in = manufactured_in.unwrap_or_else(|| "MX".to_string());
    let signature_date = signature_date.unwrap_or_else(|| Local::now().date_naive());
    let archive_dir = archive_dir.unwrap_or_else(|| std::env::temp_dir().join("usmca-origin-demo"));
    let components = match bom {
        Some(path) => BomImporter::from_path(path)?.components().to_vec(),
        None => sample_components(),
    };

    let settings = WorkflowSettings::default();
    let (qualification, certificates) =
        offline_collaborators(settings.default_threshold, &settings.bloc);
    let service = OriginWorkflowService::new(
        Arc::new(InMemorySessionRepository::default()),
        WorkflowCollaborators {
            qualification,
            certificates,
            renderer: Arc::new(TextCertificateRenderer),
            archive: Arc::new(JsonFileArchive::new(archive_dir)),
        },
        settings,
    );

    println!("USMCA certificate of origin demo (offline rulebook)");
    let classification = Classification {
        hs_code,
        product_description: "Disc brake assembly".to_string(),
    };
    let mut view = service.start(classification)?;
    let id = view.session_id.clone();
    println!("- Started session {} at step {}", id, view.step_label);

    let actions = vec![
        WorkflowAction::SetCompanyInfo {
            company_info: sample_company(),
        },
        WorkflowAction::Next,
        WorkflowAction::Next,
        WorkflowAction::ReplaceComponents { components },
        WorkflowAction::SetManufacturingLocation {
            location: manufactured_in,
        },
        WorkflowAction::Next,
        WorkflowAction::SetAuthorization {
            authorization: Authorization {
                signatory_name: "Ana Ruiz".to_string(),
                signatory_title: "Export Manager".to_string(),
                signature_date: Some(signature_date),
                signature_token: "demo-signature".to_string(),
            },
        },
        WorkflowAction::Next,
        WorkflowAction::AcceptDeclaration { accepted: true },
        WorkflowAction::SetSaveConsent {
            consent: !skip_save,
        },
    ];

    for action in actions {
        let advancing = matches!(action, WorkflowAction::Next);
        view = service.apply(&id, action).await?;
        if advancing {
            println!(
                "- Step {}: {}",
                view.current_step.number(),
                view.step_label
            );
        }
    }

    render_components(view.certificate_data.supply_chain.components.components());
    render_result(&view.regional_content, None);
    render_qualification(&view);

    if !view.can_generate {
        println!("\nCertificate cannot be generated yet:");
        for issue in validate_all(&view.certificate_data) {
            println!("  - {} / {}: {}", issue.step.label(), issue.field, issue.message);
        }
        return Ok(());
    }

    let generated = service.generate(&id).await?;
    if let Some(document) = &generated.session.certificate {
        let gaps = document.placeholder_fields();
        if gaps.is_empty() {
            println!("\nCertificate complete");
        } else {
            println!("\nCertificate fields awaiting completion: {}", gaps.join(", "));
        }
    }
    match &generated.rendered {
        Some(rendered) => println!("\n{}\n{}", rendered.file_name, rendered.body),
        None => println!("\nRendered certificate unavailable; the record was kept."),
    }

    if skip_save {
        return Ok(());
    }
    let saved = service.save(&id).await?;
    println!("Session archived to {}", saved.path.display());
    Ok(())
}

fn render_components(components: &[ComponentOrigin]) {
    println!("\nComponents");
    for component in components {
        println!(
            "- {} {:.1}% {}",
            component.country_code(),
            component.value_percentage,
            component.description
        );
    }
}

fn render_result(result: &RegionalContentResult, selection: Option<&RuleSelection>) {
    if let Some(rule) = selection {
        println!("\nRule: {}", rule.rule_description);
    }
    println!(
        "\nRegional content {:.1}% | non-regional {:.1}% | total {:.1}% ({})",
        result.regional_content,
        result.non_regional_content,
        result.total,
        result.completeness.label()
    );
    if result.qualified {
        println!("Meets the {:.1}% threshold", result.threshold_required);
    } else {
        println!(
            "Short of the {:.1}% threshold by {:.1} points",
            result.threshold_required, result.gap
        );
    }
}

fn render_qualification(view: &SessionView) {
    match &view.qualification.verdict {
        Some(verdict) => {
            let label = if verdict.qualified {
                "qualifies"
            } else {
                "does not qualify"
            };
            println!("Qualification verdict: {label}");
            if let Some(description) = &verdict.rule_description {
                println!("  {description}");
            }
            for document in &verdict.documentation {
                println!("  - keep on file: {document}");
            }
        }
        None => println!("Qualification verdict: pending"),
    }
    for notice in &view.notices {
        println!("Notice: {}", notice.message);
    }
}

fn sample_company() -> CompanyInfo {
    CompanyInfo {
        exporter: PartyInfo {
            name: "Frenos del Norte S.A. de C.V.".to_string(),
            address: "Parque Industrial 12, Saltillo, COAH".to_string(),
            country: "MX".to_string(),
            tax_id: "FNO990101XX1".to_string(),
        },
        contact_name: "Ana Ruiz".to_string(),
        contact_email: "ana.ruiz@frenos.mx".to_string(),
        importer: None,
    }
}

fn sample_components() -> Vec<ComponentOrigin> {
    vec![
        ComponentOrigin::new("MX", 50.0, "Caliper casting"),
        ComponentOrigin::new("US", 30.0, "Rotor"),
        ComponentOrigin::new("DE", 20.0, "ABS sensor"),
    ]
}
