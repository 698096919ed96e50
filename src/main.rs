use anyhow::Context;
use clap::{Arg, Command};
use log::LevelFilter;
use qrguard::{
    BrandDatabase, BrandDetector, MlEnsemble, OrgPolicy, PayloadType, PhishingEngine,
    PolicyResult, Verdict,
};
use serde::Serialize;
use std::io::BufRead;
use std::process;

#[derive(Serialize)]
struct UrlReport<'a> {
    url: &'a str,
    policy: &'a PolicyResult,
    assessment: Option<&'a qrguard::RiskAssessment>,
}

fn main() {
    let matches = Command::new("qrguard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("URL phishing classification engine for QR and link scanning")
        .arg(
            Arg::new("urls")
                .value_name("URL")
                .help("URLs to analyze; reads stdin when omitted")
                .num_args(0..),
        )
        .arg(
            Arg::new("policy")
                .short('p')
                .long("policy")
                .value_name("FILE")
                .help("Organization policy JSON (falls back to defaults on error)"),
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("FILE")
                .help("ML weight artifact JSON (falls back to built-in weights on error)"),
        )
        .arg(
            Arg::new("brands")
                .short('b')
                .long("brands")
                .value_name("FILE")
                .help("Brand database YAML (falls back to built-in table on error)"),
        )
        .arg(
            Arg::new("payload-type")
                .long("payload-type")
                .value_name("TYPE")
                .help("Treat input as a raw QR payload of this type (URL, WIFI, VCARD, SMS, ...)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit one JSON report per input line")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("test-policy")
                .long("test-policy")
                .value_name("FILE")
                .help("Validate a policy document and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("generate-policy")
                .long("generate-policy")
                .value_name("FILE")
                .help("Write the default policy document and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(path) = matches.get_one::<String>("generate-policy") {
        if let Err(e) = generate_policy(path) {
            eprintln!("Error writing policy: {e}");
            process::exit(1);
        }
        println!("Default policy written to {path}");
        return;
    }

    if let Some(path) = matches.get_one::<String>("test-policy") {
        test_policy(path);
        return;
    }

    let policy = match matches.get_one::<String>("policy") {
        Some(path) => OrgPolicy::from_json_file(path),
        None => OrgPolicy::default(),
    };
    let ml = match matches.get_one::<String>("model") {
        Some(path) => MlEnsemble::from_json_file(path),
        None => MlEnsemble::default(),
    };
    let brand_db = match matches.get_one::<String>("brands") {
        Some(path) => BrandDatabase::load_from_file(path),
        None => BrandDatabase::default(),
    };
    let brands = BrandDetector::new(brand_db.clone());
    let engine = PhishingEngine::with_parts(brand_db, ml);

    let payload_type = matches
        .get_one::<String>("payload-type")
        .map(|name| match PayloadType::from_name(name) {
            Some(t) => t,
            None => {
                eprintln!("Unknown payload type: {name}");
                process::exit(1);
            }
        });

    let inputs: Vec<String> = match matches.get_many::<String>("urls") {
        Some(urls) => urls.cloned().collect(),
        None => std::io::stdin()
            .lock()
            .lines()
            .map_while(Result::ok)
            .filter(|line| !line.trim().is_empty())
            .collect(),
    };

    if inputs.is_empty() {
        eprintln!("No input. Pass URLs as arguments or on stdin.");
        process::exit(1);
    }

    let json_output = matches.get_flag("json");
    let mut exit_code = 0;

    for input in &inputs {
        let policy_result = match payload_type {
            Some(payload_type) => policy.evaluate_payload(input, payload_type),
            None => policy.evaluate(input),
        };

        let assessment = match &policy_result {
            PolicyResult::PassedPolicy => {
                let mut assessment = engine.analyze(input);
                // Category gating is a policy concern layered over the
                // classifier's brand result.
                let brand = brands.detect(input);
                if let Some(category) = brand.category {
                    if brand.is_impersonation() && policy.is_category_blocked(category) {
                        assessment.flags.push(format!(
                            "Impersonated category {} is blocked by policy",
                            category.as_str()
                        ));
                    }
                }
                Some(assessment)
            }
            _ => None,
        };

        exit_code = exit_code.max(outcome_code(&policy_result, assessment.as_ref()));

        if json_output {
            let report = UrlReport {
                url: input,
                policy: &policy_result,
                assessment: assessment.as_ref(),
            };
            match serde_json::to_string(&report) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("Failed to serialize report: {e}"),
            }
        } else {
            print_human(input, &policy_result, assessment.as_ref());
        }
    }

    process::exit(exit_code);
}

fn outcome_code(policy: &PolicyResult, assessment: Option<&qrguard::RiskAssessment>) -> i32 {
    match policy {
        PolicyResult::Blocked { .. } => 1,
        PolicyResult::RequiresReview { .. } => 2,
        PolicyResult::Allowed { .. } => 0,
        PolicyResult::PassedPolicy => match assessment.map(|a| a.verdict) {
            Some(Verdict::Malicious) => 1,
            Some(Verdict::Suspicious) => 2,
            _ => 0,
        },
    }
}

fn print_human(url: &str, policy: &PolicyResult, assessment: Option<&qrguard::RiskAssessment>) {
    match policy {
        PolicyResult::Allowed { reason } => {
            println!("{url}\n  ALLOWED by policy: {reason}");
        }
        PolicyResult::Blocked { reason, detail } => {
            println!("{url}\n  BLOCKED by policy ({reason:?}): {detail}");
        }
        PolicyResult::RequiresReview { reason } => {
            println!("{url}\n  REQUIRES REVIEW: {reason}");
        }
        PolicyResult::PassedPolicy => {
            if let Some(assessment) = assessment {
                println!(
                    "{url}\n  {} (score {}, confidence {:.2})",
                    assessment.verdict.as_str(),
                    assessment.score,
                    assessment.confidence
                );
                for flag in &assessment.flags {
                    println!("    - {flag}");
                }
            }
        }
    }
}

fn generate_policy(path: &str) -> anyhow::Result<()> {
    let policy = OrgPolicy::default();
    std::fs::write(path, policy.to_json())
        .with_context(|| format!("failed to write {path}"))?;
    Ok(())
}

fn test_policy(path: &str) {
    println!("Testing policy {path}...");
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Cannot read {path}: {e}");
            process::exit(1);
        }
    };
    match serde_json::from_str::<qrguard::PolicyConfig>(&content) {
        Ok(config) => {
            println!("Policy is valid.");
            println!("  version: {}", config.version);
            println!("  allowed domains: {}", config.allowed_domains.len());
            println!("  blocked domains: {}", config.blocked_domains.len());
            println!("  blocked TLDs: {}", config.blocked_tlds.len());
            println!("  strict mode: {}", config.strict_mode);
        }
        Err(e) => {
            eprintln!("Policy is invalid: {e}");
            process::exit(1);
        }
    }
}
