//! `opentofu_unused_required_providers`: `required_providers` entries that
//! nothing in the module uses.

use crate::error::TofulintResult;
use crate::issue::Severity;
use crate::rules::required_providers::required_provider_entries;
use crate::rules::Rule;
use crate::runner::Runner;

pub struct UnusedRequiredProvidersRule;

impl UnusedRequiredProvidersRule {
    pub const NAME: &'static str = "opentofu_unused_required_providers";
}

impl Rule for UnusedRequiredProvidersRule {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, runner: &mut Runner) -> TofulintResult<()> {
        if !runner.module_path().is_root() {
            return Ok(());
        }

        let refs = runner.get_provider_refs()?;
        for (name, attr) in required_provider_entries(runner)? {
            if !refs.contains_key(&name) {
                runner.emit_issue(
                    self,
                    format!(
                        "provider '{name}' is declared in required_providers but not used by the module"
                    ),
                    attr.range,
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Module, ModulePath};

    fn run(src: &str) -> Vec<crate::issue::Issue> {
        let module = Module::from_sources(ModulePath::root(), [("module.tf", src)]).unwrap();
        let mut runner = Runner::new(&module);
        UnusedRequiredProvidersRule.check(&mut runner).unwrap();
        runner.into_parts().0
    }

    const REQUIRED: &str = r#"
terraform {
  required_providers {
    random = {
      source = "hashicorp/random"
    }
  }
}
"#;

    #[test]
    fn test_unused() {
        let issues = run(REQUIRED);
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].message,
            "provider 'random' is declared in required_providers but not used by the module"
        );
        assert_eq!(issues[0].range.start.line, 4);
        assert_eq!(issues[0].range.start.column, 5);
        assert_eq!(issues[0].range.end.line, 6);
    }

    #[test]
    fn test_used_by_each_kind_of_reference() {
        for usage in [
            "resource \"random_id\" \"r\" {}\n",
            "data \"random_string\" \"d\" {}\n",
            "provider \"random\" {}\n",
            "resource \"other_thing\" \"r\" {\n  provider = random.alias\n}\n",
            "module \"m\" {\n  source = \"./m\"\n  providers = {\n    random = random\n  }\n}\n",
            "check \"c\" {\n  data \"random_string\" \"d\" {}\n}\n",
            "output \"o\" {\n  value = provider::random::fn()\n}\n",
        ] {
            let issues = run(&format!("{REQUIRED}{usage}"));
            assert!(issues.is_empty(), "{usage}");
        }
    }

    #[test]
    fn test_child_module_is_skipped() {
        let module = Module::from_sources(ModulePath::root().child("c"), [("module.tf", REQUIRED)]).unwrap();
        let mut runner = Runner::new(&module);
        UnusedRequiredProvidersRule.check(&mut runner).unwrap();
        assert!(runner.issues().is_empty());
    }
}
