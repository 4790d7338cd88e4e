//! 编排集成测试：忙碌闸门、取消、失败处理与交易日志顺序

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use autoswap::config::AppConfig;
    use autoswap::core::log_sink::CLEARED_MARKER;
    use autoswap::core::{Controller, LogSink, RunOutcome, TaskError, TaskFamily};
    use autoswap::ledger::{
        AccountSnapshot, Allowance, Amount, Asset, Confirmation, ExchangeRequest, GrantOutcome,
        LedgerClient, LedgerError, TxRef,
    };
    use autoswap::recipients::StaticRecipients;
    use tokio::sync::Semaphore;
    use tokio_util::sync::CancellationToken;

    const ACCOUNT: &str = "0x1111111111111111111111111111111111111111";
    const PEER: &str = "0x2222222222222222222222222222222222222222";

    /// 计数账本：按提交序号注入失败（兑换在确认时回滚，转账在提交时被拒），可用闸门挂起所有远程调用
    #[derive(Default)]
    struct CountingLedger {
        grants: AtomicUsize,
        authorizes: AtomicUsize,
        exchanges: AtomicUsize,
        transfers: AtomicUsize,
        confirms: AtomicUsize,
        refreshes: AtomicUsize,
        granted: Mutex<HashSet<Asset>>,
        fail_exchange_on: Option<usize>,
        fail_transfer_on: Option<usize>,
        gate: Option<Arc<Semaphore>>,
    }

    impl CountingLedger {
        fn gated() -> (Self, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            (
                Self {
                    gate: Some(Arc::clone(&gate)),
                    ..Self::default()
                },
                gate,
            )
        }

        async fn pass(&self) {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
        }

        fn remote_calls(&self) -> usize {
            self.grants.load(Ordering::SeqCst)
                + self.authorizes.load(Ordering::SeqCst)
                + self.exchanges.load(Ordering::SeqCst)
                + self.transfers.load(Ordering::SeqCst)
        }
    }

    fn tx_ref(n: usize) -> TxRef {
        TxRef(format!("0x{:064x}", n))
    }

    #[async_trait]
    impl LedgerClient for CountingLedger {
        fn account(&self) -> Option<String> {
            Some(ACCOUNT.to_string())
        }

        async fn grant_if_eligible(&self, asset: Asset) -> Result<GrantOutcome, LedgerError> {
            self.pass().await;
            let n = self.grants.fetch_add(1, Ordering::SeqCst) + 1;
            if self.granted.lock().unwrap().insert(asset) {
                Ok(GrantOutcome::Submitted(tx_ref(n)))
            } else {
                Ok(GrantOutcome::AlreadyGranted)
            }
        }

        async fn authorize_spend(
            &self,
            _asset: Asset,
            _spender: &str,
            _allowance: Allowance,
        ) -> Result<TxRef, LedgerError> {
            self.pass().await;
            let n = self.authorizes.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(tx_ref(100 + n))
        }

        async fn exchange(&self, _request: &ExchangeRequest) -> Result<TxRef, LedgerError> {
            self.pass().await;
            let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(tx_ref(200 + n))
        }

        async fn transfer_native(&self, _to: &str, _amount: Amount) -> Result<TxRef, LedgerError> {
            self.pass().await;
            let n = self.transfers.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_transfer_on == Some(n) {
                return Err(LedgerError::Rpc {
                    code: -32000,
                    message: "insufficient funds".into(),
                });
            }
            Ok(tx_ref(300 + n))
        }

        async fn confirm(&self, tx: &TxRef, _receive: Option<Asset>) -> Result<Confirmation, LedgerError> {
            self.pass().await;
            self.confirms.fetch_add(1, Ordering::SeqCst);
            if self.fail_exchange_on.map(|n| tx_ref(200 + n)).as_ref() == Some(tx) {
                return Err(LedgerError::Reverted("slippage".into()));
            }
            Ok(Confirmation {
                tx: tx.clone(),
                received: None,
            })
        }

        async fn refresh_snapshot(&self) -> Result<AccountSnapshot, LedgerError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(AccountSnapshot {
                address: ACCOUNT.to_string(),
                native: Amount::from_whole(1),
                ..AccountSnapshot::default()
            })
        }
    }

    fn fast_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.swap.delay_min_ms = 0;
        cfg.swap.delay_max_ms = 0;
        cfg.send.delay_min_ms = 0;
        cfg.send.delay_max_ms = 0;
        cfg.claim.settle_ms = 0;
        cfg
    }

    fn controller_with(ledger: Arc<CountingLedger>, recipients: Vec<&str>) -> Controller {
        controller_with_config(fast_config(), ledger, recipients)
    }

    fn controller_with_config(cfg: AppConfig, ledger: Arc<CountingLedger>, recipients: Vec<&str>) -> Controller {
        Controller::new(
            Arc::new(cfg),
            ledger,
            Arc::new(StaticRecipients(recipients.into_iter().map(String::from).collect())),
            LogSink::new(1000),
            CancellationToken::new(),
        )
    }

    fn logged(controller: &Controller, needle: &str) -> usize {
        controller
            .log()
            .messages()
            .iter()
            .filter(|m| m.contains(needle))
            .count()
    }

    #[tokio::test]
    async fn test_busy_start_is_rejected_without_remote_call() {
        let (ledger, gate) = CountingLedger::gated();
        let ledger = Arc::new(ledger);
        let controller = controller_with(Arc::clone(&ledger), vec![PEER]);

        let swap = controller.start_swap_cycle(1).unwrap();
        let send = controller.start_send_random(1, "0.001").await.unwrap();
        let claim = controller.start_claim(Asset::A).unwrap();
        tokio::task::yield_now().await;

        assert_eq!(
            controller.start_swap_cycle(2).unwrap_err(),
            TaskError::AlreadyInFlight(TaskFamily::SwapCycle)
        );
        assert_eq!(
            controller.start_send_chosen(PEER, "0.5").unwrap_err(),
            TaskError::AlreadyInFlight(TaskFamily::SendBatch)
        );
        assert_eq!(
            controller.start_send_random(1, "0.001").await.unwrap_err(),
            TaskError::AlreadyInFlight(TaskFamily::SendBatch)
        );
        // 默认两种资产共用一把领取锁
        assert_eq!(
            controller.start_claim(Asset::B).unwrap_err(),
            TaskError::AlreadyInFlight(TaskFamily::Claim)
        );
        assert_eq!(
            logged(&controller, "Please stop the transaction first before starting a new one."),
            4
        );
        assert_eq!(ledger.remote_calls(), 0);

        gate.add_permits(100);
        assert_eq!(swap.await.unwrap(), RunOutcome::Completed);
        assert_eq!(send.await.unwrap(), RunOutcome::Completed);
        assert_eq!(claim.await.unwrap(), RunOutcome::Completed);
        assert_eq!(ledger.exchanges.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.transfers.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.grants.load(Ordering::SeqCst), 1);
        assert!(!controller.task_state().any_running());
    }

    #[tokio::test]
    async fn test_cancel_before_first_iteration() {
        let ledger = Arc::new(CountingLedger::default());
        let controller = controller_with(Arc::clone(&ledger), vec![PEER]);

        let handle = controller.start_swap_cycle(3).unwrap();
        assert!(controller.request_cancel(TaskFamily::SwapCycle));
        assert_eq!(handle.await.unwrap(), RunOutcome::Cancelled);

        assert_eq!(ledger.remote_calls(), 0);
        assert_eq!(logged(&controller, "Stop Transaction command received (Auto Swap)."), 1);
        assert_eq!(logged(&controller, "Auto Swap cancelled."), 1);
        assert_eq!(logged(&controller, "Auto Swap completed."), 0);

        // 运行结束后闸门释放，可以再次启动
        assert!(controller.start_swap_cycle(1).unwrap().await.unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_cancel_when_idle_logs_notice() {
        let ledger = Arc::new(CountingLedger::default());
        let controller = controller_with(ledger, vec![]);
        assert!(!controller.request_cancel(TaskFamily::SendBatch));
        assert_eq!(
            controller.log().messages().last().map(String::as_str),
            Some("No transaction is currently running.")
        );
    }

    #[tokio::test]
    async fn test_swap_cycle_end_to_end() {
        let ledger = Arc::new(CountingLedger::default());
        let controller = controller_with(Arc::clone(&ledger), vec![]);

        let outcome = controller.start_swap_cycle(3).unwrap().await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(ledger.exchanges.load(Ordering::SeqCst), 3);
        // 每种资产每次运行最多授权一次
        assert!(ledger.authorizes.load(Ordering::SeqCst) <= 2);
        assert_eq!(ledger.refreshes.load(Ordering::SeqCst), 3);
        assert_eq!(logged(&controller, "Starting Auto Swap for 3 times."), 1);
        assert_eq!(logged(&controller, "before the next swap"), 2);
        assert_eq!(
            controller.log().messages().last().map(String::as_str),
            Some("Auto Swap completed.")
        );
    }

    #[tokio::test]
    async fn test_swap_failure_is_per_iteration() {
        let ledger = Arc::new(CountingLedger {
            fail_exchange_on: Some(2),
            ..CountingLedger::default()
        });
        let controller = controller_with(Arc::clone(&ledger), vec![]);

        let outcome = controller.start_swap_cycle(3).unwrap().await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(ledger.exchanges.load(Ordering::SeqCst), 3);
        assert_eq!(ledger.refreshes.load(Ordering::SeqCst), 2);
        assert_eq!(logged(&controller, "Swap 2 failed"), 1);
        assert_eq!(logged(&controller, "Auto Swap completed."), 1);
    }

    #[tokio::test]
    async fn test_send_failure_aborts_whole_run() {
        let ledger = Arc::new(CountingLedger {
            fail_transfer_on: Some(2),
            ..CountingLedger::default()
        });
        let controller = controller_with(Arc::clone(&ledger), vec![PEER]);

        let outcome = controller.start_send_random(5, "0.001").await.unwrap().await.unwrap();
        assert!(matches!(
            outcome,
            RunOutcome::Aborted(TaskError::RemoteCallFailed(LedgerError::Rpc { code: -32000, .. }))
        ));
        assert_eq!(ledger.transfers.load(Ordering::SeqCst), 2);
        assert_eq!(logged(&controller, "Auto Send 1/5 successful to"), 1);
        assert_eq!(logged(&controller, "Error in Auto Send Token"), 1);
        assert_eq!(logged(&controller, "Auto Send Token completed."), 0);
    }

    #[tokio::test]
    async fn test_send_with_empty_address_list() {
        let ledger = Arc::new(CountingLedger::default());
        let controller = controller_with(Arc::clone(&ledger), vec![]);
        let state_rx = controller.subscribe_state();

        let err = controller.start_send_random(5, "0.001").await.unwrap_err();
        assert_eq!(err, TaskError::PreconditionFailed("Address list is empty.".into()));
        assert_eq!(ledger.transfers.load(Ordering::SeqCst), 0);
        assert_eq!(controller.log().messages(), vec!["Address list is empty.".to_string()]);
        // 闸门从未被占用，状态没有发布过
        assert!(!state_rx.has_changed().unwrap());
        assert!(!controller.task_state().any_running());
    }

    #[tokio::test]
    async fn test_send_amount_out_of_bounds_is_rejected() {
        let ledger = Arc::new(CountingLedger::default());
        let controller = controller_with(Arc::clone(&ledger), vec![PEER]);

        let err = controller.start_send_random(2, "0.5").await.unwrap_err();
        assert!(matches!(err, TaskError::PreconditionFailed(_)));
        assert!(controller.start_send_chosen("not-an-address", "0.1").is_err());
        assert!(controller.start_swap_cycle(0).is_err());
        assert_eq!(ledger.remote_calls(), 0);
        assert!(!controller.task_state().any_running());
    }

    #[tokio::test]
    async fn test_claim_twice_reports_already_claimed() {
        let ledger = Arc::new(CountingLedger::default());
        let controller = controller_with(Arc::clone(&ledger), vec![]);

        assert!(controller.start_claim(Asset::A).unwrap().await.unwrap().is_completed());
        assert!(controller.start_claim(Asset::A).unwrap().await.unwrap().is_completed());

        assert_eq!(ledger.grants.load(Ordering::SeqCst), 2);
        assert_eq!(logged(&controller, "Claim Faucet PING successful!"), 1);
        assert_eq!(logged(&controller, "PING Faucet has already been claimed."), 1);
        // 只有确认的领取会刷新余额
        assert_eq!(ledger.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_log_ordering() {
        let ledger = Arc::new(CountingLedger::default());
        let controller = controller_with(ledger, vec![]);

        controller.log().append("first");
        controller.log().append("second");
        controller.clear_log();
        controller.log().append("third");

        assert_eq!(
            controller.log().messages(),
            vec![CLEARED_MARKER.to_string(), "third".to_string()]
        );
    }

    #[tokio::test]
    async fn test_send_chosen_refreshes_after_transfer() {
        let ledger = Arc::new(CountingLedger::default());
        let controller = controller_with(Arc::clone(&ledger), vec![]);

        let outcome = controller.start_send_chosen(PEER, "0.25").unwrap().await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(ledger.transfers.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(controller.snapshot().native, Amount::from_whole(1));
    }

    #[tokio::test]
    async fn test_claim_cancel_before_grant() {
        let ledger = Arc::new(CountingLedger::default());
        let controller = controller_with(Arc::clone(&ledger), vec![]);

        let handle = controller.start_claim(Asset::A).unwrap();
        assert!(controller.request_cancel(TaskFamily::Claim));
        assert_eq!(handle.await.unwrap(), RunOutcome::Cancelled);

        assert_eq!(ledger.grants.load(Ordering::SeqCst), 0);
        assert_eq!(logged(&controller, "Claim Faucet PING cancelled."), 1);
        assert_eq!(logged(&controller, "Claiming Faucet PING..."), 0);
        assert!(!controller.task_state().any_running());
    }

    #[tokio::test]
    async fn test_send_cancel_before_first_iteration() {
        let ledger = Arc::new(CountingLedger::default());
        let controller = controller_with(Arc::clone(&ledger), vec![PEER]);

        let handle = controller.start_send_random(5, "0.001").await.unwrap();
        assert!(controller.request_cancel(TaskFamily::SendBatch));
        assert_eq!(handle.await.unwrap(), RunOutcome::Cancelled);

        assert_eq!(ledger.transfers.load(Ordering::SeqCst), 0);
        assert_eq!(logged(&controller, "Stop Transaction command received (Auto Send)."), 1);
        assert_eq!(logged(&controller, "Auto Send Token cancelled."), 1);
        assert_eq!(logged(&controller, "Auto Send Token completed."), 0);
    }

    #[tokio::test]
    async fn test_swap_cancel_during_delay_returns_promptly() {
        let mut cfg = fast_config();
        cfg.swap.delay_min_ms = 60_000;
        cfg.swap.delay_max_ms = 60_000;
        let ledger = Arc::new(CountingLedger::default());
        let controller = controller_with_config(cfg, Arc::clone(&ledger), vec![]);

        let handle = controller.start_swap_cycle(3).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while logged(&controller, "before the next swap") == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert!(controller.request_cancel(TaskFamily::SwapCycle));
        let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(ledger.exchanges.load(Ordering::SeqCst), 1);
        assert_eq!(logged(&controller, "Auto Swap cancelled."), 1);
        assert!(!controller.task_state().any_running());
    }

    #[tokio::test]
    async fn test_submissions_log_tx_sent_before_success() {
        let ledger = Arc::new(CountingLedger::default());
        let controller = controller_with(Arc::clone(&ledger), vec![PEER]);

        assert!(controller.start_claim(Asset::B).unwrap().await.unwrap().is_completed());
        assert!(controller.start_swap_cycle(1).unwrap().await.unwrap().is_completed());
        assert!(controller
            .start_send_random(1, "0.001")
            .await
            .unwrap()
            .await
            .unwrap()
            .is_completed());
        assert!(controller.start_send_chosen(PEER, "0.25").unwrap().await.unwrap().is_completed());

        let messages = controller.log().messages();
        let position = |needle: &str| {
            messages
                .iter()
                .position(|m| m.contains(needle))
                .unwrap_or_else(|| panic!("missing log line: {}", needle))
        };
        assert!(position("Transaction sent. Tx Hash:") < position("Claim Faucet PONG successful!"));
        assert!(position("Approval TX sent:") < position("Approval successful."));
        assert!(position("Swap 1 TX sent:") < position("Swap 1 successful."));
        assert!(position("Auto Send 1/1 TX sent:") < position(&format!("Auto Send 1/1 successful to {}.", PEER)));
        assert!(position(&format!("Token sent to {} successfully.", PEER)) > position("Auto Send 1/1 successful"));
        assert_eq!(logged(&controller, "Transaction sent. Tx Hash:"), 2);

        // 每笔提交都等待了确认：领取 1 + 授权 1 + 兑换 1 + 转账 2
        let submitted = ledger.remote_calls();
        assert_eq!(submitted, 5);
        assert_eq!(ledger.confirms.load(Ordering::SeqCst), submitted);
    }
}
