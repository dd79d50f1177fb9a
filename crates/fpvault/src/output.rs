use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde_json::json;

use fpvault_proto::Settings;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

fn print_json(value: serde_json::Value) {
    println!("{}", serde_json::to_string(&value).unwrap_or_else(|_| "{}".to_string()));
}

pub fn print_sites(sitenames: &[String], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(json!({ "sitenames": sitenames })),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SITE"]);
            for site in sitenames {
                table.add_row(vec![site.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for site in sitenames {
                println!("{site}");
            }
        }
    }
}

pub fn print_credential(sitename: &str, username: &str, password: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(json!({
            "sitename": sitename,
            "username": username,
            "password": password,
        })),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SITE", "USERNAME", "PASSWORD"])
                .add_row(vec![sitename, username, password]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("site={sitename} username={username} password={password}");
        }
    }
}

pub fn print_settings(settings: &Settings, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(json!({ "settings": settings })),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FINGERPRINT ID", "NAME"]);
            for (id, name) in &settings.fingerprints {
                table.add_row(vec![id.to_string(), name.clone()]);
            }
            println!("{table}");
            println!("password slots available: {}", settings.num_pswd_avail);
        }
        OutputFormat::Pretty => {
            for (id, name) in &settings.fingerprints {
                println!("fingerprint {id}: {name}");
            }
            println!("password slots available: {}", settings.num_pswd_avail);
        }
    }
}

pub fn print_fingerprint(fp_id: u16, fp_hash: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(json!({ "fpId": fp_id, "fpHash": fp_hash })),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FINGERPRINT ID", "TEMPLATE DIGEST"])
                .add_row(vec![fp_id.to_string(), fp_hash.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("fingerprint {fp_id} digest {fp_hash}");
        }
    }
}
