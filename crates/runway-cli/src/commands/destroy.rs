use std::io::Write;

use runway_cloud::{AwsClient, StackPresence};

/// Delete the environment's stack and wait until it is gone.
pub async fn destroy(environment: Option<&str>, skip_confirm: bool) -> anyhow::Result<()> {
    let target = super::resolve_target(environment)?;
    let stack = target.names.stack.as_str();
    let client = AwsClient::new(&target.region);

    if client.probe_stack(stack).await == StackPresence::Absent {
        println!("Stack {stack} does not exist in {}; nothing to delete.", target.region);
        return Ok(());
    }

    if !skip_confirm {
        println!("This will delete stack '{stack}' in {}:", target.region);
        println!("  - App Runner service '{}'", target.names.service());
        println!("  - ECR repository '{}' and its images", target.names.repository());
        println!("  - IAM roles created for the service");
        println!();
        print!("Are you sure? [y/N] ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !matches!(input.trim(), "y" | "Y" | "yes" | "YES") {
            println!("Aborted.");
            return Ok(());
        }
    }

    println!("Deleting stack '{stack}'...");
    client.delete_stack(stack).await?;

    println!();
    println!("Destroy complete.");
    println!(
        "Note: the shared CodeBuild project '{}' and artifact bucket are kept for other environments.",
        target.names.codebuild_project
    );

    Ok(())
}
