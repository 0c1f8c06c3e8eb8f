//! 트리거 디바운서
//!
//! 첫 트리거가 고정 길이 윈도우를 열고, 윈도우 안에서 들어온 트리거는
//! 가장 최근 값 하나로 합쳐져 윈도우가 닫힐 때 전달됩니다.
//! 윈도우는 이후 트리거로 연장되지 않습니다.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// `input`을 디바운스한 수신 채널을 반환합니다.
///
/// 출력 채널은 토큰이 취소되거나 입력이 닫히고 남은 값이 전달된 뒤 닫힙니다.
pub fn debounce<T: Send + 'static>(
    token: CancellationToken,
    window: Duration,
    mut input: mpsc::Receiver<T>,
) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        loop {
            let mut latest = tokio::select! {
                _ = token.cancelled() => return,
                value = input.recv() => match value {
                    Some(value) => value,
                    None => return,
                },
            };

            let deadline = tokio::time::sleep(window);
            tokio::pin!(deadline);
            let mut input_closed = false;
            let mut coalesced = 0usize;

            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = &mut deadline => break,
                    value = input.recv(), if !input_closed => match value {
                        Some(value) => {
                            latest = value;
                            coalesced += 1;
                        }
                        None => input_closed = true,
                    },
                }
            }

            trace!(coalesced, "debounce window closed");
            tokio::select! {
                _ = token.cancelled() => return,
                sent = tx.send(latest) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }

            if input_closed {
                return;
            }
        }
    });

    rx
}
