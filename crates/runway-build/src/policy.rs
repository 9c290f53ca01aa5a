//! IAM documents for the CodeBuild service role.

use serde_json::{Value, json};

/// Trust policy letting CodeBuild assume the role.
pub fn codebuild_trust_policy() -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "codebuild.amazonaws.com" },
            "Action": "sts:AssumeRole"
        }]
    })
}

/// Inline policy scoped to log writes, registry push/pull on the project's
/// repositories, and reads of the build inputs.
pub fn codebuild_role_policy(account: &str, region: &str, prefix: &str, bucket: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": "Logs",
                "Effect": "Allow",
                "Action": [
                    "logs:CreateLogGroup",
                    "logs:CreateLogStream",
                    "logs:PutLogEvents"
                ],
                "Resource": format!("arn:aws:logs:{region}:{account}:log-group:/aws/codebuild/*")
            },
            {
                "Sid": "RegistryAuth",
                "Effect": "Allow",
                "Action": "ecr:GetAuthorizationToken",
                "Resource": "*"
            },
            {
                "Sid": "RegistryPushPull",
                "Effect": "Allow",
                "Action": [
                    "ecr:BatchCheckLayerAvailability",
                    "ecr:BatchGetImage",
                    "ecr:GetDownloadUrlForLayer",
                    "ecr:InitiateLayerUpload",
                    "ecr:UploadLayerPart",
                    "ecr:CompleteLayerUpload",
                    "ecr:PutImage"
                ],
                "Resource": format!("arn:aws:ecr:{region}:{account}:repository/{prefix}-*")
            },
            {
                "Sid": "BuildInputs",
                "Effect": "Allow",
                "Action": ["s3:GetObject", "s3:GetObjectVersion"],
                "Resource": format!("arn:aws:s3:::{bucket}/*")
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_policy_names_codebuild() {
        let policy = codebuild_trust_policy();
        assert_eq!(
            policy["Statement"][0]["Principal"]["Service"],
            "codebuild.amazonaws.com"
        );
    }

    #[test]
    fn role_policy_is_scoped_to_project_repositories() {
        let policy = codebuild_role_policy("111122223333", "us-east-1", "app", "bucket");
        let statements = policy["Statement"].as_array().unwrap();
        let push = statements.iter().find(|s| s["Sid"] == "RegistryPushPull").unwrap();
        assert_eq!(
            push["Resource"],
            "arn:aws:ecr:us-east-1:111122223333:repository/app-*"
        );
        let inputs = statements.iter().find(|s| s["Sid"] == "BuildInputs").unwrap();
        assert_eq!(inputs["Resource"], "arn:aws:s3:::bucket/*");
    }
}
