use runway_core::{HEALTH_CHECK_PATH, IMAGE_TAG, ServiceConfig};
use serde_json::{Map, Value, json};

/// Stack output holding the ECR repository URI.
pub const REPOSITORY_URI_OUTPUT: &str = "RepositoryUri";
/// Stack output holding the public service URL.
pub const SERVICE_URL_OUTPUT: &str = "ServiceUrl";
/// Stack output holding the App Runner service ARN.
pub const SERVICE_ARN_OUTPUT: &str = "ServiceArn";

/// Keys of the database secret, each bound as its own environment variable.
pub const SECRET_KEYS: [&str; 4] = ["MYSQL_USER", "MYSQL_PASSWORD", "MYSQL_HOST", "MYSQL_DATABASE"];

const CREATE_SERVICE_CONDITION: &str = "CreateService";
const ECR_ACCESS_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AWSAppRunnerServicePolicyForECRAccess";

/// Health check timings (seconds / consecutive probes).
const HEALTH_INTERVAL: u32 = 10;
const HEALTH_TIMEOUT: u32 = 5;
const HEALTHY_THRESHOLD: u32 = 1;
const UNHEALTHY_THRESHOLD: u32 = 5;

/// Generates the CloudFormation template for one environment's stack:
/// ECR repository, App Runner service, and the roles the service needs.
///
/// Service resources sit behind the `CreateService` condition so that the
/// first deploy can create the repository alone.
pub struct StackTemplate<'a> {
    prefix: &'a str,
    service: &'a ServiceConfig,
    with_secrets: bool,
}

impl<'a> StackTemplate<'a> {
    pub fn new(prefix: &'a str, service: &'a ServiceConfig, with_secrets: bool) -> Self {
        Self {
            prefix,
            service,
            with_secrets,
        }
    }

    pub fn render(&self) -> Value {
        let mut parameters = Map::new();
        parameters.insert(
            "environment".to_owned(),
            json!({ "Type": "String", "Description": "Deployment environment name" }),
        );
        parameters.insert(
            "createService".to_owned(),
            json!({
                "Type": "String",
                "AllowedValues": ["true", "false"],
                "Default": "true",
                "Description": "Set to false to create only the image repository"
            }),
        );
        if self.with_secrets {
            parameters.insert(
                "secretsArn".to_owned(),
                json!({ "Type": "String", "Description": "Secrets Manager ARN with database credentials" }),
            );
        }

        let mut resources = Map::new();
        resources.insert("Repository".to_owned(), self.repository());
        resources.insert("AccessRole".to_owned(), access_role());
        if self.with_secrets {
            resources.insert("InstanceRole".to_owned(), instance_role());
        }
        resources.insert("Service".to_owned(), self.app_runner_service());

        json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Description": format!("runway: {} container service", self.prefix),
            "Parameters": parameters,
            "Conditions": {
                CREATE_SERVICE_CONDITION: { "Fn::Equals": [{ "Ref": "createService" }, "true"] }
            },
            "Resources": resources,
            "Outputs": {
                REPOSITORY_URI_OUTPUT: {
                    "Value": { "Fn::GetAtt": ["Repository", "RepositoryUri"] }
                },
                SERVICE_URL_OUTPUT: {
                    "Condition": CREATE_SERVICE_CONDITION,
                    "Value": { "Fn::Sub": "https://${Service.ServiceUrl}" }
                },
                SERVICE_ARN_OUTPUT: {
                    "Condition": CREATE_SERVICE_CONDITION,
                    "Value": { "Fn::GetAtt": ["Service", "ServiceArn"] }
                }
            }
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.render())
    }

    fn resource_name(&self) -> Value {
        json!({ "Fn::Sub": format!("{}-${{environment}}", self.prefix) })
    }

    fn repository(&self) -> Value {
        let lifecycle = json!({
            "rules": [{
                "rulePriority": 1,
                "description": format!("Keep the last {} images", self.service.image_retention),
                "selection": {
                    "tagStatus": "any",
                    "countType": "imageCountMoreThan",
                    "countNumber": self.service.image_retention
                },
                "action": { "type": "expire" }
            }]
        });

        json!({
            "Type": "AWS::ECR::Repository",
            "Properties": {
                "RepositoryName": self.resource_name(),
                "EmptyOnDelete": true,
                "ImageScanningConfiguration": { "ScanOnPush": true },
                "LifecyclePolicy": { "LifecyclePolicyText": lifecycle.to_string() }
            }
        })
    }

    fn app_runner_service(&self) -> Value {
        let port = self.service.port.to_string();

        let mut image_configuration = Map::new();
        image_configuration.insert("Port".to_owned(), json!(port));
        image_configuration.insert(
            "RuntimeEnvironmentVariables".to_owned(),
            json!([
                { "Name": "ENVIRONMENT", "Value": { "Ref": "environment" } },
                { "Name": "PORT", "Value": port }
            ]),
        );
        if self.with_secrets {
            let secrets: Vec<Value> = SECRET_KEYS
                .iter()
                .map(|key| {
                    json!({
                        "Name": key,
                        "Value": { "Fn::Sub": format!("${{secretsArn}}:{key}::") }
                    })
                })
                .collect();
            image_configuration.insert("RuntimeEnvironmentSecrets".to_owned(), json!(secrets));
        }

        let mut instance_configuration = Map::new();
        instance_configuration.insert("Cpu".to_owned(), json!(self.service.cpu));
        instance_configuration.insert("Memory".to_owned(), json!(self.service.memory));
        if self.with_secrets {
            instance_configuration.insert(
                "InstanceRoleArn".to_owned(),
                json!({ "Fn::GetAtt": ["InstanceRole", "Arn"] }),
            );
        }

        json!({
            "Type": "AWS::AppRunner::Service",
            "Condition": CREATE_SERVICE_CONDITION,
            "Properties": {
                "ServiceName": self.resource_name(),
                "SourceConfiguration": {
                    "AuthenticationConfiguration": {
                        "AccessRoleArn": { "Fn::GetAtt": ["AccessRole", "Arn"] }
                    },
                    "AutoDeploymentsEnabled": self.service.auto_deployments,
                    "ImageRepository": {
                        "ImageIdentifier": {
                            "Fn::Sub": format!("${{Repository.RepositoryUri}}:{IMAGE_TAG}")
                        },
                        "ImageRepositoryType": "ECR",
                        "ImageConfiguration": image_configuration
                    }
                },
                "InstanceConfiguration": instance_configuration,
                "HealthCheckConfiguration": {
                    "Protocol": "HTTP",
                    "Path": HEALTH_CHECK_PATH,
                    "Interval": HEALTH_INTERVAL,
                    "Timeout": HEALTH_TIMEOUT,
                    "HealthyThreshold": HEALTHY_THRESHOLD,
                    "UnhealthyThreshold": UNHEALTHY_THRESHOLD
                }
            }
        })
    }
}

fn access_role() -> Value {
    json!({
        "Type": "AWS::IAM::Role",
        "Condition": CREATE_SERVICE_CONDITION,
        "Properties": {
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Service": "build.apprunner.amazonaws.com" },
                    "Action": "sts:AssumeRole"
                }]
            },
            "ManagedPolicyArns": [ECR_ACCESS_POLICY_ARN]
        }
    })
}

fn instance_role() -> Value {
    json!({
        "Type": "AWS::IAM::Role",
        "Condition": CREATE_SERVICE_CONDITION,
        "Properties": {
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Service": "tasks.apprunner.amazonaws.com" },
                    "Action": "sts:AssumeRole"
                }]
            },
            "Policies": [{
                "PolicyName": "read-database-secret",
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": "secretsmanager:GetSecretValue",
                        "Resource": { "Ref": "secretsArn" }
                    }]
                }
            }]
        }
    })
}

/// Values passed to `cloudformation deploy --parameter-overrides`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackParameters {
    pub environment: String,
    pub create_service: bool,
    pub secrets_arn: Option<String>,
}

impl StackParameters {
    /// First deploy: repository only.
    pub fn bootstrap(environment: &str) -> Self {
        Self {
            environment: environment.to_owned(),
            create_service: false,
            secrets_arn: None,
        }
    }

    /// Full convergence, service included.
    pub fn full(environment: &str, secrets_arn: Option<&str>) -> Self {
        Self {
            environment: environment.to_owned(),
            create_service: true,
            secrets_arn: secrets_arn.map(str::to_owned),
        }
    }

    /// `createService` is always passed: `cloudformation deploy` reuses the
    /// previous value of omitted parameters, which after a bootstrap is `false`.
    pub fn overrides(&self) -> Vec<String> {
        let mut overrides = vec![
            format!("environment={}", self.environment),
            format!("createService={}", self.create_service),
        ];
        if let Some(arn) = &self.secrets_arn {
            overrides.push(format!("secretsArn={arn}"));
        }
        overrides
    }
}
