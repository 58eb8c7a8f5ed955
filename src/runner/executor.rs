//! Workflow execution: drives one test case through its UI stages.
//!
//! Checkout: `Init → Authenticated → CartPopulated → BillingSubmitted →
//! {EarlyExit | PaymentSubmitted} → Finished`.
//!
//! Registration: `Init → FormSubmitted → Asserted`.

use regex::Regex;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::context::TestContext;
use super::events::{EventEmitter, TestEvent};
use super::outcome::{classify, stops_after_billing, OutcomeIntent, OutcomeKind};
use super::state::CaseState;
use crate::driver::common::{wait_until, PollConfig};
use crate::driver::traits::{Selector, UiDriver};
use crate::error::{AssertionFailure, CaseError};
use crate::parser::types::{CheckoutFields, TestCaseRecord, Workflow, WorkflowFields};
use crate::utils::config::HarnessConfig;

pub const SUCCESS_BANNER: &str = ".alert.alert-success";
pub const ERROR_BANNER: &str = ".alert.alert-danger";
pub const LOGGED_IN_NOTICE: &str = "already logged in. You can proceed to checkout.";
const ACCOUNT_TITLE: &str = "My account";

/// How a registration field reaches its form control
#[derive(Debug, Clone, Copy)]
enum Control {
    Fill(&'static str),
    Select(&'static str),
}

/// Registration field → control, in fill order.
///
/// The form names its controls the other way round for state and country.
const REGISTRATION_CONTROLS: &[(&str, Control)] = &[
    ("first_name", Control::Fill("first-name")),
    ("last_name", Control::Fill("last-name")),
    ("email", Control::Fill("email")),
    ("password", Control::Fill("password")),
    ("dob", Control::Fill("dob")),
    ("address", Control::Fill("address")),
    ("city", Control::Fill("city")),
    ("state", Control::Select("country")),
    ("postcode", Control::Fill("postcode")),
    ("phone", Control::Fill("phone")),
    ("country", Control::Fill("state")),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
    Init,
    Authenticated,
    CartPopulated,
    BillingSubmitted,
    EarlyExit,
    PaymentSubmitted,
    Finished,
}

impl CheckoutState {
    pub fn name(&self) -> &'static str {
        match self {
            CheckoutState::Init => "Init",
            CheckoutState::Authenticated => "Authenticated",
            CheckoutState::CartPopulated => "CartPopulated",
            CheckoutState::BillingSubmitted => "BillingSubmitted",
            CheckoutState::EarlyExit => "EarlyExit",
            CheckoutState::PaymentSubmitted => "PaymentSubmitted",
            CheckoutState::Finished => "Finished",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Init,
    FormSubmitted,
    Asserted,
}

impl RegistrationState {
    pub fn name(&self) -> &'static str {
        match self {
            RegistrationState::Init => "Init",
            RegistrationState::FormSubmitted => "FormSubmitted",
            RegistrationState::Asserted => "Asserted",
        }
    }
}

/// Result of a test case that did not fail
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseOutcome {
    /// States visited, in order
    pub trail: Vec<&'static str>,
    pub screenshot: Option<PathBuf>,
    /// Which assertion ran; `None` when `expectedResult` named neither outcome
    pub asserted: Option<OutcomeKind>,
}

/// Runs test cases against a driver session
pub struct WorkflowExecutor {
    config: Arc<HarnessConfig>,
    context: TestContext,
    emitter: EventEmitter,
}

impl WorkflowExecutor {
    pub fn new(config: Arc<HarnessConfig>, context: TestContext, emitter: EventEmitter) -> Self {
        Self {
            config,
            context,
            emitter,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn context(&self) -> &TestContext {
        &self.context
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// Run one test case on its own session. Stage progress is recorded in
    /// `case` and broadcast as events.
    pub async fn execute(
        &self,
        driver: &dyn UiDriver,
        record: &TestCaseRecord,
        case: &mut CaseState,
    ) -> Result<CaseOutcome, CaseError> {
        match &record.fields {
            WorkflowFields::Checkout(fields) => {
                self.run_checkout(driver, record, fields, case).await
            }
            WorkflowFields::Registration(_) => self.run_registration(driver, record, case).await,
        }
    }

    // ========================================================================
    // Checkout
    // ========================================================================

    pub async fn run_checkout(
        &self,
        driver: &dyn UiDriver,
        record: &TestCaseRecord,
        fields: &CheckoutFields,
        case: &mut CaseState,
    ) -> Result<CaseOutcome, CaseError> {
        // Checkout only asserts errors that name a message
        let intent = classify(&record.expected_result)
            .filter(|i| i.kind == OutcomeKind::Success || i.message.is_some());
        let mut outcome = CaseOutcome::default();
        let mut session_injected = false;
        let mut state = CheckoutState::Init;

        loop {
            outcome.trail.push(state.name());
            state = match state {
                CheckoutState::Init => {
                    session_injected = self
                        .stage(case, "authenticate", self.authenticate(driver, record))
                        .await?;
                    CheckoutState::Authenticated
                }
                CheckoutState::Authenticated => {
                    self.stage(case, "populate cart", self.populate_cart(driver, session_injected))
                        .await?;
                    CheckoutState::CartPopulated
                }
                CheckoutState::CartPopulated => {
                    self.stage(case, "billing address", self.fill_billing(driver, fields))
                        .await?;
                    CheckoutState::BillingSubmitted
                }
                CheckoutState::BillingSubmitted => {
                    if stops_after_billing(intent.as_ref(), &record.expected_result) {
                        CheckoutState::EarlyExit
                    } else {
                        self.stage(case, "payment", self.submit_payment(driver, record, fields))
                            .await?;
                        CheckoutState::PaymentSubmitted
                    }
                }
                CheckoutState::EarlyExit => {
                    outcome.asserted = self
                        .stage(
                            case,
                            "assert billing error",
                            self.assert_banner(driver, intent.as_ref(), &record.test_id),
                        )
                        .await?;
                    break;
                }
                CheckoutState::PaymentSubmitted => {
                    let path = self.context.screenshot_path(Workflow::Checkout, &record.test_id);
                    case.screenshot_path = Some(path.display().to_string());
                    outcome.asserted = self
                        .stage(
                            case,
                            "assert outcome",
                            self.capture_and_assert(driver, intent.as_ref(), &record.test_id, &path),
                        )
                        .await?;
                    outcome.screenshot = Some(path);
                    CheckoutState::Finished
                }
                CheckoutState::Finished => break,
            };
        }

        Ok(outcome)
    }

    /// Log in or install the saved session. Returns true when the session was
    /// injected and still needs confirming.
    async fn authenticate(
        &self,
        driver: &dyn UiDriver,
        record: &TestCaseRecord,
    ) -> Result<bool, CaseError> {
        if record.precondition.contains("logged in") {
            self.login(driver).await?;
            Ok(false)
        } else {
            driver.inject_session(&self.config.session_artifact).await?;
            Ok(true)
        }
    }

    async fn populate_cart(
        &self,
        driver: &dyn UiDriver,
        session_injected: bool,
    ) -> Result<(), CaseError> {
        driver.navigate(&self.config.url(&self.config.product_path)).await?;
        driver.click(&Selector::test_id("add-to-cart")).await?;
        driver.navigate(&self.config.url("checkout")).await?;
        driver.click(&Selector::test_id("proceed-1")).await?;

        if session_injected
            && !driver
                .is_visible(&Selector::has_text("p", LOGGED_IN_NOTICE))
                .await?
        {
            log::info!("Saved session is not active, logging in");
            self.emitter.emit(TestEvent::Log {
                message: "saved session inactive, logging in".to_string(),
            });
            self.login(driver).await?;
            driver.navigate(&self.config.url("checkout")).await?;
            driver.click(&Selector::test_id("proceed-1")).await?;
        }

        driver.click(&Selector::test_id("proceed-2")).await?;
        Ok(())
    }

    async fn fill_billing(
        &self,
        driver: &dyn UiDriver,
        fields: &CheckoutFields,
    ) -> Result<(), CaseError> {
        let billing = [
            ("address", &fields.address),
            ("city", &fields.city),
            ("state", &fields.state),
            ("country", &fields.country),
            ("postcode", &fields.postcode),
        ];
        for (control, value) in billing {
            self.fill_when_visible(driver, control, value.as_deref().unwrap_or(""))
                .await?;
        }
        Ok(())
    }

    async fn submit_payment(
        &self,
        driver: &dyn UiDriver,
        record: &TestCaseRecord,
        fields: &CheckoutFields,
    ) -> Result<(), CaseError> {
        driver.click(&Selector::test_id("proceed-3")).await?;

        match fields.payment_method.as_deref() {
            Some(method) => {
                driver
                    .select_option(&Selector::test_id("payment-method"), method)
                    .await?
            }
            None => log::warn!(
                "{}: no payment_method given, leaving the selection untouched",
                record.test_id
            ),
        }

        let payment = [
            ("account-name", &fields.account_name),
            ("account-number", &fields.account_number),
        ];
        for (control, value) in payment {
            self.fill_when_visible(driver, control, value.as_deref().unwrap_or(""))
                .await?;
        }

        driver.click(&Selector::test_id("finish")).await?;
        Ok(())
    }

    async fn capture_and_assert(
        &self,
        driver: &dyn UiDriver,
        intent: Option<&OutcomeIntent>,
        test_id: &str,
        path: &std::path::Path,
    ) -> Result<Option<OutcomeKind>, CaseError> {
        driver.screenshot(path).await?;
        self.assert_banner(driver, intent, test_id).await
    }

    // ========================================================================
    // Registration
    // ========================================================================

    pub async fn run_registration(
        &self,
        driver: &dyn UiDriver,
        record: &TestCaseRecord,
        case: &mut CaseState,
    ) -> Result<CaseOutcome, CaseError> {
        let intent = classify(&record.expected_result);
        let mut outcome = CaseOutcome::default();
        let mut state = RegistrationState::Init;

        loop {
            outcome.trail.push(state.name());
            state = match state {
                RegistrationState::Init => {
                    let path = self
                        .context
                        .screenshot_path(Workflow::Registration, &record.test_id);
                    self.stage(case, "submit form", self.submit_registration(driver, record, &path))
                        .await?;
                    case.screenshot_path = Some(path.display().to_string());
                    outcome.screenshot = Some(path);
                    RegistrationState::FormSubmitted
                }
                RegistrationState::FormSubmitted => {
                    outcome.asserted = self
                        .stage(
                            case,
                            "assert outcome",
                            self.assert_registration(driver, intent.as_ref(), &record.test_id),
                        )
                        .await?;
                    RegistrationState::Asserted
                }
                RegistrationState::Asserted => break,
            };
        }

        Ok(outcome)
    }

    async fn submit_registration(
        &self,
        driver: &dyn UiDriver,
        record: &TestCaseRecord,
        screenshot: &std::path::Path,
    ) -> Result<(), CaseError> {
        driver.navigate(&self.config.url("auth/register")).await?;

        for (field, control) in REGISTRATION_CONTROLS {
            // Absent fields are left alone; present-but-empty ones are still written.
            let Some(value) = record.fields.get(field) else {
                continue;
            };
            match control {
                Control::Fill(name) => driver.fill(&Selector::test_id(name), value).await?,
                Control::Select(name) => {
                    driver
                        .select_option(&Selector::test_id(name), value)
                        .await?
                }
            }
        }

        driver.click(&Selector::role("button", "Register")).await?;
        tokio::time::sleep(Duration::from_millis(self.config.timeouts.settle_ms)).await;
        driver.screenshot(screenshot).await?;
        Ok(())
    }

    async fn assert_registration(
        &self,
        driver: &dyn UiDriver,
        intent: Option<&OutcomeIntent>,
        test_id: &str,
    ) -> Result<Option<OutcomeKind>, CaseError> {
        match intent {
            Some(i) if i.kind == OutcomeKind::Success => {
                self.expect_navigation(driver).await?;
                Ok(Some(OutcomeKind::Success))
            }
            _ => self.assert_banner(driver, intent, test_id).await,
        }
    }

    // ========================================================================
    // Shared steps
    // ========================================================================

    /// Run one stage, recording it on the case and broadcasting its progress
    async fn stage<T, F>(&self, case: &mut CaseState, name: &str, work: F) -> Result<T, CaseError>
    where
        F: Future<Output = Result<T, CaseError>>,
    {
        let index = case.begin_stage(name);
        self.emitter.emit(TestEvent::StageStarted {
            test_id: case.test_id.clone(),
            index,
            stage: name.to_string(),
        });

        match work.await {
            Ok(value) => {
                let duration_ms = case.pass_stage(index);
                self.emitter.emit(TestEvent::StagePassed {
                    test_id: case.test_id.clone(),
                    index,
                    duration_ms,
                });
                Ok(value)
            }
            Err(e) => {
                let duration_ms = case.fail_stage(index, e.to_string());
                self.emitter.emit(TestEvent::StageFailed {
                    test_id: case.test_id.clone(),
                    index,
                    error: e.to_string(),
                    duration_ms,
                });
                Err(e)
            }
        }
    }

    async fn login(&self, driver: &dyn UiDriver) -> Result<(), CaseError> {
        let credentials = &self.config.credentials;
        driver.navigate(&self.config.url("auth/login")).await?;
        driver
            .fill(&Selector::test_id("email"), &credentials.email)
            .await?;
        driver
            .fill(&Selector::test_id("password"), &credentials.password)
            .await?;
        driver.click(&Selector::test_id("login-submit")).await?;

        let title = Selector::test_id("page-title");
        let timeout_ms = self.config.timeouts.action_ms;
        if !driver.wait_for_visible(&title, timeout_ms).await? {
            return Err(AssertionFailure::LoginFailed {
                email: credentials.email.clone(),
                reason: format!("account page did not load within {}ms", timeout_ms),
            }
            .into());
        }

        let text = driver.text_content(&title).await?;
        if !text.contains(ACCOUNT_TITLE) {
            return Err(AssertionFailure::LoginFailed {
                email: credentials.email.clone(),
                reason: format!("page title was \"{}\"", text.trim()),
            }
            .into());
        }
        Ok(())
    }

    async fn fill_when_visible(
        &self,
        driver: &dyn UiDriver,
        control: &str,
        value: &str,
    ) -> Result<(), CaseError> {
        let selector = Selector::test_id(control);
        let timeout_ms = self.config.timeouts.action_ms;
        if !driver.wait_for_visible(&selector, timeout_ms).await? {
            return Err(anyhow::anyhow!(
                "control {} was not visible within {}ms",
                selector,
                timeout_ms
            )
            .into());
        }
        driver.fill(&selector, value).await?;
        Ok(())
    }

    /// Assert the success or error banner for `intent`
    async fn assert_banner(
        &self,
        driver: &dyn UiDriver,
        intent: Option<&OutcomeIntent>,
        test_id: &str,
    ) -> Result<Option<OutcomeKind>, CaseError> {
        let Some(intent) = intent else {
            log::warn!(
                "{}: expectedResult names neither success nor error, no assertion performed",
                test_id
            );
            return Ok(None);
        };

        let selector = match intent.kind {
            OutcomeKind::Success => Selector::css(SUCCESS_BANNER),
            OutcomeKind::Error => Selector::css(ERROR_BANNER),
        };
        self.expect_banner(driver, &selector, intent.kind.label(), intent.fragment())
            .await?;
        Ok(Some(intent.kind))
    }

    async fn expect_banner(
        &self,
        driver: &dyn UiDriver,
        selector: &Selector,
        kind: &'static str,
        expected: &str,
    ) -> Result<(), CaseError> {
        let timeout_ms = self.config.timeouts.message_ms;
        if !driver.wait_for_visible(selector, timeout_ms).await? {
            return Err(AssertionFailure::NotDisplayed {
                kind,
                selector: selector.to_string(),
                expected: expected.to_string(),
                timeout_ms,
            }
            .into());
        }

        let actual = driver.text_content(selector).await?;
        if !actual.contains(expected) {
            return Err(AssertionFailure::Mismatch {
                kind,
                expected: expected.to_string(),
                actual: actual.trim().to_string(),
            }
            .into());
        }
        log::debug!("{} message validation passed: \"{}\"", kind, expected);
        Ok(())
    }

    async fn expect_navigation(&self, driver: &dyn UiDriver) -> Result<(), CaseError> {
        let destination = &self.config.login_destination;
        let pattern = Regex::new(destination)
            .map_err(|e| anyhow::anyhow!("Invalid login destination pattern: {}", e))?;
        let timeout_ms = self.config.timeouts.navigation_ms;

        let pattern_ref = &pattern;
        let arrived = wait_until(
            || async move {
                let url = driver.current_url().await?;
                Ok::<bool, anyhow::Error>(pattern_ref.is_match(&url))
            },
            PollConfig::with_timeout(timeout_ms),
        )
        .await?;

        if !arrived {
            return Err(AssertionFailure::NavigationTimeout {
                expected: destination.clone(),
                actual: driver.current_url().await?,
                timeout_ms,
            }
            .into());
        }
        Ok(())
    }
}
