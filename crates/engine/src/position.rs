//! Simulated futures position lifecycle: open, monitor, close
//!
//! Brackets are ATR-scaled at entry and only ever tighten afterwards
//! (breakeven ratchet, trailing stop). Close reasons record the actual
//! trigger. All prices come from the cycle's market snapshots; a symbol
//! with no snapshot this cycle is left untouched.

use std::collections::HashMap;

use chrono::Utc;

use crate::bot::{round2, BotState, Position, TradeRecord, COOLDOWN_CYCLES};
use crate::consensus::TradeDecision;
use crate::types::{CloseReason, Direction, MarketSnapshot};

/// Smallest tradeable stake
const MIN_BET: f64 = 1.0;
/// Bracket fallback when no ATR is available on either timeframe
const ATR_FALLBACK_RATIO: f64 = 0.001;

/// Try to open a position for an approved decision. Returns false when a
/// risk limit blocks the entry.
pub fn open(
    bot: &mut BotState,
    snapshot: &MarketSnapshot,
    decision: &TradeDecision,
    cycle: u64,
) -> bool {
    let risk = &bot.genome.risk;
    if bot.positions.len() >= risk.max_open_positions {
        return false;
    }
    if bot.has_position(&snapshot.symbol) {
        return false;
    }
    if bot.in_cooldown(&snapshot.symbol, cycle) {
        return false;
    }
    if bot.bankroll > 0.0 && bot.exposure / bot.bankroll * 100.0 >= risk.max_exposure_pct {
        return false;
    }

    let price = snapshot.price;
    if price <= 0.0 {
        return false;
    }

    let pct = bot.current_bet_pct.min(bot.genome.betting.max_bet_pct);
    let available = bot.bankroll - bot.exposure;
    let bet = (bot.bankroll * pct / 100.0).min(available).max(MIN_BET);
    let quantity = bet * risk.leverage as f64 / price;

    let atr = snapshot.sizing_atr().unwrap_or(price * ATR_FALLBACK_RATIO);
    let (take_profit, stop_loss) = match decision.direction {
        Direction::Long => (
            price + atr * risk.atr_tp_mult,
            price - atr * risk.atr_sl_mult,
        ),
        Direction::Short => (
            price - atr * risk.atr_tp_mult,
            price + atr * risk.atr_sl_mult,
        ),
        Direction::Neutral => return false,
    };
    let trailing_distance = if risk.trailing_stop_atr > 0.0 {
        atr * risk.trailing_stop_atr
    } else {
        0.0
    };

    let now = Utc::now().timestamp_millis();
    bot.positions.push(Position {
        symbol: snapshot.symbol.clone(),
        side: decision.direction,
        entry_price: price,
        quantity,
        leverage: risk.leverage,
        bet_amount: bet,
        take_profit,
        stop_loss,
        trailing_distance,
        high_water_mark: price,
        opened_at: now,
        consensus: decision.clone(),
    });
    bot.exposure += bet;
    bot.last_trade_time = Some(now);
    true
}

/// Walk every open position against this cycle's snapshots: ratchet stops,
/// then close whatever crossed a trigger. Returns the closed trades.
pub fn monitor(
    bot: &mut BotState,
    snapshots: &HashMap<String, MarketSnapshot>,
    cycle: u64,
) -> Vec<TradeRecord> {
    let mut closed = Vec::new();
    let mut i = 0;
    while i < bot.positions.len() {
        let snapshot = match snapshots.get(&bot.positions[i].symbol) {
            Some(s) => s,
            None => {
                i += 1;
                continue;
            }
        };
        let price = snapshot.price;

        {
            let pos = &mut bot.positions[i];

            // Breakeven ratchet: past half the TP distance the stop moves
            // to entry, one way only
            let (profit, tp_distance) = match pos.side {
                Direction::Long => (price - pos.entry_price, pos.take_profit - pos.entry_price),
                _ => (pos.entry_price - price, pos.entry_price - pos.take_profit),
            };
            if profit >= tp_distance * 0.5 {
                match pos.side {
                    Direction::Long if pos.stop_loss < pos.entry_price => {
                        pos.stop_loss = pos.entry_price;
                    }
                    Direction::Short if pos.stop_loss > pos.entry_price => {
                        pos.stop_loss = pos.entry_price;
                    }
                    _ => {}
                }
            }

            // Trailing stop follows a new favorable extreme, never loosens
            if pos.trailing_distance > 0.0 {
                match pos.side {
                    Direction::Long if price > pos.high_water_mark => {
                        pos.high_water_mark = price;
                        let candidate = price - pos.trailing_distance;
                        if candidate > pos.stop_loss {
                            pos.stop_loss = candidate;
                        }
                    }
                    Direction::Short if price < pos.high_water_mark => {
                        pos.high_water_mark = price;
                        let candidate = price + pos.trailing_distance;
                        if candidate < pos.stop_loss {
                            pos.stop_loss = candidate;
                        }
                    }
                    _ => {}
                }
            }
        }

        let flip_threshold = bot.genome.risk.flip_exit_threshold;
        if let Some(reason) = close_trigger(&bot.positions[i], snapshot, price, flip_threshold) {
            closed.push(close(bot, i, price, reason, cycle));
        } else {
            i += 1;
        }
    }
    closed
}

/// TP first, then stop, then signal flip
fn close_trigger(
    pos: &Position,
    snapshot: &MarketSnapshot,
    price: f64,
    flip_threshold: u32,
) -> Option<CloseReason> {
    let (tp_hit, sl_hit) = match pos.side {
        Direction::Long => (price >= pos.take_profit, price <= pos.stop_loss),
        _ => (price <= pos.take_profit, price >= pos.stop_loss),
    };
    if tp_hit {
        return Some(CloseReason::TakeProfit);
    }
    if sl_hit {
        let hwm_advanced = match pos.side {
            Direction::Long => pos.high_water_mark > pos.entry_price,
            _ => pos.high_water_mark < pos.entry_price,
        };
        return Some(if pos.trailing_distance > 0.0 && hwm_advanced {
            CloseReason::TrailingStop
        } else {
            CloseReason::StopLoss
        });
    }

    // Flip exit counts opposition across the whole pool, mask ignored
    if flip_threshold > 0 {
        let opposing = snapshot
            .signals
            .iter()
            .filter(|s| s.direction == pos.side.opposite())
            .count() as u32;
        if opposing >= flip_threshold {
            return Some(CloseReason::SignalFlip);
        }
    }
    None
}

/// Close the position at `index`, settle pnl into the bankroll and record
/// the trade
pub fn close(
    bot: &mut BotState,
    index: usize,
    exit_price: f64,
    reason: CloseReason,
    cycle: u64,
) -> TradeRecord {
    let pos = bot.positions.remove(index);

    let raw_move = match pos.side {
        Direction::Long => (exit_price - pos.entry_price) / pos.entry_price,
        _ => (pos.entry_price - exit_price) / pos.entry_price,
    };
    let pnl_pct = raw_move * 100.0 * pos.leverage as f64;
    let pnl_value = pos.bet_amount * pnl_pct / 100.0;

    let bankroll_before = bot.bankroll;
    bot.bankroll = (bot.bankroll + pnl_value).max(0.0);
    bot.exposure = (bot.exposure - pos.bet_amount).max(0.0);
    bot.trades += 1;
    bot.record_pnl(pnl_pct);

    let betting = bot.genome.betting.clone();
    if pnl_value > 0.0 {
        bot.wins += 1;
        bot.consecutive_wins += 1;
        bot.consecutive_losses = 0;
        bot.current_bet_pct = (bot.current_bet_pct * betting.win_mult).min(betting.max_bet_pct);
        bot.tp_value_total += pnl_value;
    } else {
        bot.losses += 1;
        bot.consecutive_losses += 1;
        bot.consecutive_wins = 0;
        bot.current_bet_pct = (bot.current_bet_pct * betting.loss_mult).max(1.0);
        if bot.consecutive_losses >= betting.reset_after_losses {
            bot.current_bet_pct = betting.base_pct;
        }
        if pnl_value < 0.0 {
            bot.sl_value_total += pnl_value.abs();
        }
    }

    if bot.bankroll > bot.max_bankroll {
        bot.max_bankroll = bot.bankroll;
    }
    if bot.bankroll < bot.min_bankroll {
        bot.min_bankroll = bot.bankroll;
    }
    if bot.max_bankroll > 0.0 {
        let drawdown = (bot.max_bankroll - bot.bankroll) / bot.max_bankroll * 100.0;
        if drawdown > bot.max_drawdown_pct {
            bot.max_drawdown_pct = drawdown;
        }
    }

    // A losing symbol sits out the next cycles
    if pnl_value < 0.0 {
        bot.cooldowns
            .insert(pos.symbol.clone(), cycle + COOLDOWN_CYCLES);
    }

    for id in &pos.consensus.top_strategies {
        let metric = bot.strategy_metrics.entry(id.clone()).or_default();
        metric.trades += 1;
        if pnl_value > 0.0 {
            metric.wins += 1;
        }
        metric.pnl += pnl_value;
    }

    let now = Utc::now().timestamp_millis();
    bot.last_trade_time = Some(now);

    let record = TradeRecord {
        symbol: pos.symbol,
        side: pos.side,
        entry_price: pos.entry_price,
        exit_price,
        bet_amount: pos.bet_amount,
        pnl_pct: round2(pnl_pct),
        pnl_value: round2(pnl_value),
        reason,
        bankroll_before: round2(bankroll_before),
        bankroll_after: round2(bot.bankroll),
        timestamp: now,
        consensus: pos.consensus,
    };
    bot.record_trade(record.clone());
    record
}
