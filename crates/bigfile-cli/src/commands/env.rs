// Copyright (C) 2026  winnyboy5
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
use crate::output;
use crate::repo::BigfileRepo;
use anyhow::Result;
use bigfile_config::{Config, ENV_OVERRIDES};
use bigfile_git::protocol::handshake_offer;
use clap::Args;

/// Show the effective configuration
#[derive(Debug, Args)]
pub struct EnvCmd {}

impl EnvCmd {
    pub async fn execute(self) -> Result<()> {
        let repo = BigfileRepo::current().await?;

        output::header("Repository");
        output::detail("Root", &repo.root.display().to_string());
        output::detail("Git dir", &repo.git_dir.display().to_string());
        output::detail(
            "Config file",
            &Config::find_file(&repo.git_dir)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none, using defaults)".to_string()),
        );
        output::detail("Object store", &repo.store_path().display().to_string());
        output::detail(
            "Remote",
            &repo
                .remote_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string()),
        );
        output::detail("Protocol", handshake_offer().trim_end());

        println!();
        output::header("Environment");
        for name in ENV_OVERRIDES {
            if let Ok(value) = std::env::var(name) {
                output::detail(name, &value);
            }
        }

        println!();
        output::header("Effective configuration");
        print!("{}", toml::to_string_pretty(&repo.config)?);
        Ok(())
    }
}
